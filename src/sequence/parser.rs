// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use tracing::debug;

use super::{
    command::{Command, SongEvent},
    error::SequenceError,
    smd::{TrackChunk, TRACK_EVENTS_OFFSET},
};

/// Rest lengths selected by opcodes 0x80-0x8F.
pub const FIXED_RESTS: [u32; 16] = [96, 72, 64, 48, 36, 32, 24, 18, 16, 12, 9, 8, 6, 4, 3, 2];

/// The events of one track and where the next chunk starts.
#[derive(Debug, Clone)]
pub struct ParsedTrack {
    pub events: Vec<SongEvent>,
    /// Absolute offset just past this chunk, after 4-byte alignment.
    pub end: u64,
}

/// Argument lengths for opcodes that are understood structurally but not semantically.
fn unknown_arg_len(opcode: u8) -> Option<usize> {
    match opcode {
        0x9D | 0xC0 => Some(0),
        0x9C | 0xA5 | 0xA9 | 0xAA | 0xB2 | 0xB5 | 0xBE | 0xBF | 0xD0 | 0xD1 | 0xD2 | 0xD8
        | 0xDB | 0xF6 => Some(1),
        0xA8 | 0xB4 | 0xD6 => Some(2),
        0xD4 | 0xE2 | 0xEA => Some(3),
        0xDC => Some(5),
        _ => None,
    }
}

/// Parses a track chunk into events ordered by offset.
///
/// Parsing stops at the first Finish opcode. The cursor only ever moves forward, so every
/// offset is recorded exactly once.
pub fn parse_track(track: usize, chunk: &TrackChunk) -> Result<ParsedTrack, SequenceError> {
    let mut cursor = Cursor {
        data: &chunk.data,
        position: TRACK_EVENTS_OFFSET,
        base: chunk.base_offset,
    };
    let mut events = Vec::new();
    let mut last_duration: u32 = 0;
    let mut last_rest: u32 = 0;

    loop {
        let offset = cursor.offset();
        let opcode = cursor.u8()?;
        let command = match opcode {
            0x01..=0x7F => {
                let arg = cursor.u8()?;
                let num_params = (arg & 0xC0) >> 6;
                let octave_delta = ((arg & 0x30) >> 4) as i8 - 2;
                let key = arg & 0x0F;
                if key >= 12 {
                    return Err(SequenceError::MalformedSequence { track, offset, key });
                }
                let duration = if num_params == 0 {
                    last_duration
                } else {
                    // Big endian, 1 to 3 bytes.
                    let mut duration = 0u32;
                    for _ in 0..num_params {
                        duration = (duration << 8) | u32::from(cursor.u8()?);
                    }
                    last_duration = duration;
                    duration
                };
                Command::Note {
                    key,
                    octave_delta,
                    velocity: opcode,
                    duration,
                }
            }
            0x80..=0x8F => {
                last_rest = FIXED_RESTS[usize::from(opcode - 0x80)];
                Command::Rest { ticks: last_rest }
            }
            0x90 => Command::Rest { ticks: last_rest },
            0x91 => {
                last_rest = last_rest.wrapping_add_signed(i32::from(cursor.u8()? as i8));
                Command::Rest { ticks: last_rest }
            }
            0x92 => {
                last_rest = u32::from(cursor.u8()?);
                Command::Rest { ticks: last_rest }
            }
            0x93 => {
                last_rest = u32::from(cursor.u16()?);
                Command::Rest { ticks: last_rest }
            }
            0x94 => {
                let bytes = cursor.bytes(3)?;
                last_rest =
                    u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16;
                Command::Rest { ticks: last_rest }
            }
            0x98 => Command::Finish,
            0x99 => Command::LoopStart {
                target: cursor.offset(),
            },
            0xA0 => Command::Octave {
                octave: cursor.u8()?,
            },
            0xA4 => Command::Tempo { bpm: cursor.u8()? },
            0xAC => Command::Voice { id: cursor.u8()? },
            0xD7 => Command::PitchBend {
                bend: cursor.u16()?,
            },
            0xE0 => Command::Volume {
                volume: cursor.u8()?,
            },
            0xE3 => Command::Expression {
                expression: cursor.u8()?,
            },
            0xE8 => Command::Panpot {
                panpot: cursor.u8()?.wrapping_sub(0x40) as i8,
            },
            _ => match unknown_arg_len(opcode) {
                Some(len) => Command::Unknown {
                    opcode,
                    args: cursor.bytes(len)?.to_vec(),
                },
                None => {
                    return Err(SequenceError::UnknownOpcode {
                        track,
                        offset,
                        opcode,
                    })
                }
            },
        };

        let finished = command == Command::Finish;
        events.push(SongEvent::new(offset, command));
        if finished {
            break;
        }
    }

    debug!(track, events = events.len(), "Parsed track");

    Ok(ParsedTrack {
        events,
        end: chunk.end_offset(),
    })
}

/// Forward-only reader over a chunk that reports absolute offsets.
struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
    base: u64,
}

impl<'a> Cursor<'a> {
    fn offset(&self) -> u64 {
        self.base + self.position as u64
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], SequenceError> {
        let data = self.data;
        let bytes = data
            .get(self.position..self.position + len)
            .ok_or(SequenceError::Truncated {
                offset: self.offset(),
            })?;
        self.position += len;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, SequenceError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, SequenceError> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}
