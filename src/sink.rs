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
//! Destinations for rendered audio.

use thiserror::Error;

mod cpal;
mod wav;

pub use self::cpal::CpalSink;
pub use wav::WavSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("WAV output failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("no default output device")]
    NoDevice,

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("unable to query output config: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("the sink is closed")]
    Closed,
}

/// Receives interleaved stereo blocks at the engine's output rate.
pub trait AudioSink: Send {
    fn write(&mut self, block: &[i16]) -> Result<(), SinkError>;

    /// Flushes anything buffered. Writes after this fail.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
