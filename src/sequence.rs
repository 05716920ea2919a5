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
//! Sequence decoding.
//!
//! This module provides:
//! - The SMD container reader that splits a song file into per-track chunks
//! - The opcode parser that turns a track chunk into typed events
//! - The event model shared with the player

mod command;
mod error;
mod parser;
mod smd;

pub use command::{Command, SongEvent};
pub use error::SequenceError;
pub use parser::{parse_track, ParsedTrack, FIXED_RESTS};
pub use smd::{SmdFile, SmdHeader, SongInfo, SongSource, TrackChunk};

/// Parses every track of the given song source.
pub fn parse_song(source: &dyn SongSource) -> Result<Vec<Vec<SongEvent>>, SequenceError> {
    (0..source.track_count())
        .map(|index| {
            let chunk = source.read_track_chunk(index)?;
            Ok(parse_track(index, &chunk)?.events)
        })
        .collect()
}
