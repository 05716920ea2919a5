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
//! Sample bank access.
//!
//! The engine only sees a resolved view of the bank: voice and key to an instrument, and
//! instrument to raw sample bytes. How the bank is stored is up to the implementation.

use std::{fmt, str::FromStr, sync::Arc};

use serde::Deserialize;

use crate::synth::tables::ARM7_CLOCK;

mod memory;

pub use memory::{MemoryBank, Split};

/// Encoding of the raw sample bytes.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    Pcm8,
    Pcm16,
    Adpcm,
}

impl FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pcm8" => Ok(SampleFormat::Pcm8),
            "pcm16" => Ok(SampleFormat::Pcm16),
            "adpcm" => Ok(SampleFormat::Adpcm),
            _ => Err(format!("unknown sample format {}", s)),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::Pcm8 => write!(f, "PCM8"),
            SampleFormat::Pcm16 => write!(f, "PCM16"),
            SampleFormat::Adpcm => write!(f, "ADPCM"),
        }
    }
}

/// A raw waveform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleData {
    pub format: SampleFormat,
    pub data: Vec<u8>,
    /// Loop start in 32-bit words.
    pub loop_start: u32,
    pub looped: bool,
    pub sample_rate: u32,
}

impl SampleData {
    /// Byte offset playback resumes from when the sample loops.
    pub fn loop_offset(&self) -> usize {
        self.loop_start as usize * 4
    }
}

/// Handle to a sample within a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleRef(pub usize);

/// Envelope bytes as stored in the bank, each 0-127.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    pub release: u8,
}

/// A resolved instrument for a single note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub sample: SampleRef,
    pub root_key: u8,
    /// Playback timer at the root key.
    pub base_timer: u16,
    pub envelope: Envelope,
}

/// Read-only instrument and sample lookups.
pub trait SampleBank: Send + Sync {
    /// Finds the instrument a voice plays for the given key, if any.
    fn lookup_instrument(&self, voice: u8, key: i32) -> Option<Instrument>;

    /// Returns the sample data for a sample reference.
    fn sample_data(&self, sample: SampleRef) -> Option<Arc<SampleData>>;
}

/// Computes the base timer for a sample rate. A zero rate has no timer.
pub fn base_timer(sample_rate: u32) -> Option<u16> {
    if sample_rate == 0 {
        return None;
    }
    Some((ARM7_CLOCK / sample_rate).min(u32::from(u16::MAX)) as u16)
}
