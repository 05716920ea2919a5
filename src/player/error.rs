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
use thiserror::Error;

use crate::{config::ConfigError, sequence::SequenceError, sink::SinkError};

#[derive(Debug, Error)]
pub enum PlayerError {
    /// A Finish jumped to a loop anchor that matches no event. The parser never produces
    /// this, so seeing it means the event list was corrupted.
    #[error("track {track} loops to offset {offset:#x}, which matches no event")]
    LoopTargetMissing { track: usize, offset: u64 },

    #[error("no song is loaded")]
    NoSong,

    #[error("unable to start sequencer thread: {0}")]
    Thread(String),

    #[error("no song at index {0}")]
    SongIndex(usize),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
