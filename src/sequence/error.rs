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

/// Errors raised while loading a song file.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("Unsupported SMD header version 0x{0:X}")]
    UnsupportedFormatVersion(u16),

    #[error("Not an SMD file (magic {0:?})")]
    InvalidMagic([u8; 4]),

    #[error("Track {track} has an invalid note key {key} at offset 0x{offset:X}")]
    MalformedSequence { track: usize, offset: u64, key: u8 },

    #[error("Track {track} has an unknown opcode 0x{opcode:02X} at offset 0x{offset:X}")]
    UnknownOpcode { track: usize, offset: u64, opcode: u8 },

    #[error("Unexpected end of data at offset 0x{offset:X}")]
    Truncated { offset: u64 },

    #[error("Track index {0} is out of range")]
    TrackIndex(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
