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
use std::fmt;

const KEY_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A decoded sequence command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plays a note. The key is a scale degree (0-11) relative to the track octave.
    Note {
        key: u8,
        octave_delta: i8,
        velocity: u8,
        duration: u32,
    },
    Rest {
        ticks: u32,
    },
    Tempo {
        bpm: u8,
    },
    Voice {
        id: u8,
    },
    Volume {
        volume: u8,
    },
    Expression {
        expression: u8,
    },
    /// Pan centered at 0.
    Panpot {
        panpot: i8,
    },
    PitchBend {
        bend: u16,
    },
    Octave {
        octave: u8,
    },
    /// Records the absolute offset that a later Finish jumps back to.
    LoopStart {
        target: u64,
    },
    Finish,
    /// An opcode whose meaning is unknown. The raw argument bytes are kept as-is.
    Unknown {
        opcode: u8,
        args: Vec<u8>,
    },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Note {
                key,
                octave_delta,
                velocity,
                duration,
            } => write!(
                f,
                "Note {} (octave {:+}, velocity {}, duration {})",
                KEY_NAMES[usize::from(*key) % KEY_NAMES.len()],
                octave_delta,
                velocity,
                duration
            ),
            Command::Rest { ticks } => write!(f, "Rest {}", ticks),
            Command::Tempo { bpm } => write!(f, "Tempo {}", bpm),
            Command::Voice { id } => write!(f, "Voice {}", id),
            Command::Volume { volume } => write!(f, "Volume {}", volume),
            Command::Expression { expression } => write!(f, "Expression {}", expression),
            Command::Panpot { panpot } => write!(f, "Panpot {}", panpot),
            Command::PitchBend { bend } => write!(f, "Pitch Bend {}", bend),
            Command::Octave { octave } => write!(f, "Octave {}", octave),
            Command::LoopStart { target } => write!(f, "Loop Start 0x{:X}", target),
            Command::Finish => write!(f, "Finish"),
            Command::Unknown { opcode, args } => {
                write!(f, "Unknown 0x{:02X}", opcode)?;
                for arg in args {
                    write!(f, " {:02X}", arg)?;
                }
                Ok(())
            }
        }
    }
}

/// A command at a fixed position in its track chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongEvent {
    /// Absolute byte offset of the opcode. Unique within a track.
    pub offset: u64,
    pub command: Command,
    /// Every tick at which this event was reached while simulating the track.
    pub ticks: Vec<u64>,
}

impl SongEvent {
    /// Creates a new event that hasn't been reached yet.
    pub fn new(offset: u64, command: Command) -> SongEvent {
        SongEvent {
            offset,
            command,
            ticks: Vec::new(),
        }
    }

    /// Records a tick this event was reached at. Ticks are only added, never replaced.
    pub fn record_tick(&mut self, tick: u64) {
        if !self.ticks.contains(&tick) {
            self.ticks.push(tick);
        }
    }
}

impl fmt::Display for SongEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X} {}", self.offset, self.command)?;
        if !self.ticks.is_empty() {
            let ticks: Vec<String> = self.ticks.iter().map(|tick| tick.to_string()).collect();
            write!(f, " @ {}", ticks.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_tick_is_additive() {
        let mut event = SongEvent::new(0x10, Command::Finish);
        event.record_tick(0);
        event.record_tick(48);
        event.record_tick(0);
        assert_eq!(vec![0, 48], event.ticks);
    }

    #[test]
    fn test_display() {
        let note = Command::Note {
            key: 1,
            octave_delta: -1,
            velocity: 100,
            duration: 48,
        };
        assert_eq!("Note C# (octave -1, velocity 100, duration 48)", note.to_string());

        let unknown = Command::Unknown {
            opcode: 0xDC,
            args: vec![1, 2, 0xFF],
        };
        assert_eq!("Unknown 0xDC 01 02 FF", unknown.to_string());

        let mut event = SongEvent::new(0x54, Command::Rest { ticks: 12 });
        event.record_tick(96);
        assert_eq!("0x000054 Rest 12 @ 96", event.to_string());
    }
}
