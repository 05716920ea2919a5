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
use std::{fmt, fs, path::Path};

use tracing::debug;

use super::error::SequenceError;

const MAGIC: &[u8; 4] = b"smdl";
const HEADER_SIZE: usize = 0x40;
const SONG_CHUNK_V402_SIZE: usize = 0x20;
const SONG_CHUNK_V415_SIZE: usize = 0x40;

/// Offset of the declared length within a track chunk.
const TRACK_LENGTH_OFFSET: usize = 0x0C;
/// The declared length counts from here.
const TRACK_BODY_OFFSET: usize = 0x10;
/// Offset of the first event within a track chunk.
pub(crate) const TRACK_EVENTS_OFFSET: usize = 0x14;

/// The raw bytes of one track.
#[derive(Debug, Clone)]
pub struct TrackChunk {
    /// The version from the file header.
    pub header_version: u16,
    /// Absolute offset of the chunk within the file.
    pub base_offset: u64,
    /// The chunk bytes, starting at the chunk header.
    pub data: Vec<u8>,
    /// The length declared by the chunk header.
    pub declared_length: u32,
}

impl TrackChunk {
    /// Absolute offset of the next chunk: the declared body end, aligned to 4 bytes.
    pub fn end_offset(&self) -> u64 {
        align4(self.base_offset + TRACK_BODY_OFFSET as u64 + u64::from(self.declared_length))
    }
}

/// Anything that can hand out per-track chunks of a song.
pub trait SongSource {
    /// The number of tracks in the song.
    fn track_count(&self) -> usize;

    /// Reads the chunk for the given track.
    fn read_track_chunk(&self, index: usize) -> Result<TrackChunk, SequenceError>;
}

/// The fixed file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmdHeader {
    pub file_length: u32,
    pub version: u16,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub centisecond: u8,
    pub label: String,
}

impl fmt::Display for SmdHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (version 0x{:X}, {:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:02})",
            self.label,
            self.version,
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.centisecond
        )
    }
}

/// The song chunk that follows the header. Its layout depends on the header version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongInfo {
    pub track_count: u8,
    pub channel_count: u8,
    /// Only present in version 0x402 files.
    pub master_volume: Option<i8>,
    /// Only present in version 0x402 files.
    pub master_panpot: Option<i8>,
}

/// An SMD song file held in memory.
pub struct SmdFile {
    data: Vec<u8>,
    header: SmdHeader,
    song: SongInfo,
    /// Absolute start offset of each track chunk.
    track_offsets: Vec<usize>,
}

impl SmdFile {
    /// Reads and indexes an SMD file from disk.
    pub fn open(path: &Path) -> Result<SmdFile, SequenceError> {
        SmdFile::from_bytes(fs::read(path)?)
    }

    /// Indexes an SMD file held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<SmdFile, SequenceError> {
        let reader = Reader { data: &data };
        let magic = reader.array::<4>(0)?;
        if &magic != MAGIC {
            return Err(SequenceError::InvalidMagic(magic));
        }
        reader.ensure(0, HEADER_SIZE)?;

        let header = SmdHeader {
            file_length: reader.u32(0x08)?,
            version: reader.u16(0x0C)?,
            year: reader.u16(0x18)?,
            month: reader.u8(0x1A)?,
            day: reader.u8(0x1B)?,
            hour: reader.u8(0x1C)?,
            minute: reader.u8(0x1D)?,
            second: reader.u8(0x1E)?,
            centisecond: reader.u8(0x1F)?,
            label: reader.label(0x20, 16)?,
        };

        let (song, song_chunk_size) = match header.version {
            0x402 => (
                SongInfo {
                    track_count: reader.u8(HEADER_SIZE + 0x14)?,
                    channel_count: reader.u8(HEADER_SIZE + 0x15)?,
                    master_volume: Some(reader.u8(HEADER_SIZE + 0x1A)? as i8),
                    master_panpot: Some(reader.u8(HEADER_SIZE + 0x1B)? as i8),
                },
                SONG_CHUNK_V402_SIZE,
            ),
            0x415 => (
                SongInfo {
                    track_count: reader.u8(HEADER_SIZE + 0x16)?,
                    channel_count: reader.u8(HEADER_SIZE + 0x17)?,
                    master_volume: None,
                    master_panpot: None,
                },
                SONG_CHUNK_V415_SIZE,
            ),
            version => return Err(SequenceError::UnsupportedFormatVersion(version)),
        };

        let mut track_offsets = Vec::with_capacity(usize::from(song.track_count));
        let mut position = HEADER_SIZE + song_chunk_size;
        for _ in 0..song.track_count {
            track_offsets.push(position);
            let declared = reader.u32(position + TRACK_LENGTH_OFFSET)? as usize;
            position = align4((position + TRACK_BODY_OFFSET + declared) as u64) as usize;
        }

        debug!(
            version = header.version,
            tracks = song.track_count,
            label = header.label,
            "Indexed SMD file"
        );

        Ok(SmdFile {
            data,
            header,
            song,
            track_offsets,
        })
    }

    /// The file header.
    pub fn header(&self) -> &SmdHeader {
        &self.header
    }

    /// The song chunk.
    pub fn song(&self) -> &SongInfo {
        &self.song
    }
}

impl SongSource for SmdFile {
    fn track_count(&self) -> usize {
        self.track_offsets.len()
    }

    fn read_track_chunk(&self, index: usize) -> Result<TrackChunk, SequenceError> {
        let start = *self
            .track_offsets
            .get(index)
            .ok_or(SequenceError::TrackIndex(index))?;
        let reader = Reader { data: &self.data };
        let declared_length = reader.u32(start + TRACK_LENGTH_OFFSET)?;
        let end = (start + TRACK_BODY_OFFSET + declared_length as usize).min(self.data.len());

        Ok(TrackChunk {
            header_version: self.header.version,
            base_offset: start as u64,
            data: self.data[start..end].to_vec(),
            declared_length,
        })
    }
}

/// Rounds up to the next multiple of 4.
fn align4(offset: u64) -> u64 {
    (offset + 3) & !3
}

/// Bounds-checked little-endian reads at absolute offsets.
struct Reader<'a> {
    data: &'a [u8],
}

impl Reader<'_> {
    fn ensure(&self, offset: usize, size: usize) -> Result<(), SequenceError> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(SequenceError::Truncated {
                offset: offset as u64,
            }),
        }
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], SequenceError> {
        self.ensure(offset, N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[offset..offset + N]);
        Ok(bytes)
    }

    fn u8(&self, offset: usize) -> Result<u8, SequenceError> {
        Ok(self.array::<1>(offset)?[0])
    }

    fn u16(&self, offset: usize) -> Result<u16, SequenceError> {
        Ok(u16::from_le_bytes(self.array(offset)?))
    }

    fn u32(&self, offset: usize) -> Result<u32, SequenceError> {
        Ok(u32::from_le_bytes(self.array(offset)?))
    }

    fn label(&self, offset: usize, size: usize) -> Result<String, SequenceError> {
        self.ensure(offset, size)?;
        let raw = &self.data[offset..offset + size];
        let len = raw.iter().position(|b| *b == 0).unwrap_or(size);
        Ok(String::from_utf8_lossy(&raw[..len]).to_string())
    }
}

#[cfg(test)]
mod test {
    use crate::test::build_smd;

    use super::*;

    #[test]
    fn test_v402_header() -> Result<(), SequenceError> {
        let file = SmdFile::from_bytes(build_smd(0x402, &[vec![0x98], vec![0x80, 0x98]]))?;
        assert_eq!(0x402, file.header().version);
        assert_eq!("bgm0001", file.header().label);
        assert_eq!(2007, file.header().year);
        assert_eq!(2, file.song().track_count);
        assert_eq!(Some(127), file.song().master_volume);
        assert_eq!(Some(0), file.song().master_panpot);
        assert_eq!(2, file.track_count());
        Ok(())
    }

    #[test]
    fn test_v415_track_chunks() -> Result<(), SequenceError> {
        let file = SmdFile::from_bytes(build_smd(0x415, &[vec![0x98], vec![0xE0, 0x7F, 0x98]]))?;
        assert_eq!(None, file.song().master_volume);

        let first = file.read_track_chunk(0)?;
        assert_eq!(0x415, first.header_version);
        assert_eq!(0x80, first.base_offset);
        // Track header word plus one opcode.
        assert_eq!(5, first.declared_length);
        assert_eq!(0x98, first.data[TRACK_EVENTS_OFFSET]);

        let second = file.read_track_chunk(1)?;
        assert_eq!(first.end_offset(), second.base_offset);
        assert_eq!(0, second.base_offset % 4);
        assert_eq!(&[0xE0, 0x7F, 0x98], &second.data[TRACK_EVENTS_OFFSET..]);
        Ok(())
    }

    #[test]
    fn test_unsupported_version() {
        let result = SmdFile::from_bytes(build_smd(0x300, &[vec![0x98]]));
        assert!(matches!(
            result,
            Err(SequenceError::UnsupportedFormatVersion(0x300))
        ));
    }

    #[test]
    fn test_bad_magic_and_truncation() {
        let mut data = build_smd(0x402, &[vec![0x98]]);
        data[0] = b'x';
        assert!(matches!(
            SmdFile::from_bytes(data),
            Err(SequenceError::InvalidMagic(_))
        ));

        let mut data = build_smd(0x402, &[vec![0x98]]);
        data.truncate(0x50);
        assert!(matches!(
            SmdFile::from_bytes(data),
            Err(SequenceError::Truncated { .. })
        ));
    }

    #[test]
    fn test_track_index_out_of_range() -> Result<(), SequenceError> {
        let file = SmdFile::from_bytes(build_smd(0x402, &[vec![0x98]]))?;
        assert!(matches!(
            file.read_track_chunk(3),
            Err(SequenceError::TrackIndex(3))
        ));
        Ok(())
    }
}
