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
use std::{fs::File, io::BufWriter, path::Path};

use tracing::info;

use crate::synth::SAMPLE_RATE;

use super::{AudioSink, SinkError};

/// Writes 16-bit stereo WAV at the engine's native rate.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    frames: u64,
}

impl WavSink {
    pub fn create(path: &Path) -> Result<WavSink, SinkError> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        Ok(WavSink {
            writer: Some(hound::WavWriter::create(path, spec)?),
            frames: 0,
        })
    }
}

impl AudioSink for WavSink {
    fn write(&mut self, block: &[i16]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        for sample in block {
            writer.write_sample(*sample)?;
        }
        self.frames += (block.len() / 2) as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            info!(frames = self.frames, "Finished WAV output");
        }
        Ok(())
    }
}
