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
//! Sample synthesis.
//!
//! This module provides:
//! - Per-channel ADSR envelopes and PCM8/PCM16/ADPCM decoding
//! - A fixed pool of channels mixed into interleaved stereo
//! - The lookup tables both of those share

mod adpcm;
mod channel;
mod mixer;
pub mod tables;

pub use adpcm::AdpcmDecoder;
pub use channel::{Channel, EnvelopeState};
pub use mixer::{Mixer, TrackMix, CHANNEL_COUNT, FRAMES_PER_TICK, SAMPLE_RATE, TICK_RATE};
