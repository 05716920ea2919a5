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
use std::{collections::HashMap, sync::Arc};

use super::{base_timer, Envelope, Instrument, SampleBank, SampleData, SampleRef};

/// A key range of a program mapped to one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub low_key: u8,
    pub high_key: u8,
    pub root_key: u8,
    pub sample: SampleRef,
    pub envelope: Envelope,
}

impl Split {
    fn contains(&self, key: i32) -> bool {
        key >= i32::from(self.low_key) && key <= i32::from(self.high_key)
    }
}

/// A sample bank held entirely in memory.
#[derive(Default)]
pub struct MemoryBank {
    /// Splits per voice, searched in insertion order.
    programs: HashMap<u8, Vec<Split>>,
    samples: Vec<Arc<SampleData>>,
}

impl MemoryBank {
    /// Creates an empty bank. Every lookup against it fails.
    pub fn new() -> MemoryBank {
        MemoryBank::default()
    }

    /// Adds a sample and returns its reference.
    pub fn add_sample(&mut self, sample: SampleData) -> SampleRef {
        self.samples.push(Arc::new(sample));
        SampleRef(self.samples.len() - 1)
    }

    /// Appends a split to a voice's program.
    pub fn add_split(&mut self, voice: u8, split: Split) {
        self.programs.entry(voice).or_default().push(split);
    }

    /// The number of programs in the bank.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// The number of samples in the bank.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl SampleBank for MemoryBank {
    fn lookup_instrument(&self, voice: u8, key: i32) -> Option<Instrument> {
        let split = self
            .programs
            .get(&voice)?
            .iter()
            .find(|split| split.contains(key))?;
        let sample = self.samples.get(split.sample.0)?;

        Some(Instrument {
            sample: split.sample,
            root_key: split.root_key,
            base_timer: base_timer(sample.sample_rate)?,
            envelope: split.envelope,
        })
    }

    fn sample_data(&self, sample: SampleRef) -> Option<Arc<SampleData>> {
        self.samples.get(sample.0).cloned()
    }
}

#[cfg(test)]
mod test {
    use crate::bank::SampleFormat;

    use super::*;

    fn sample(sample_rate: u32) -> SampleData {
        SampleData {
            format: SampleFormat::Pcm8,
            data: vec![0; 16],
            loop_start: 0,
            looped: false,
            sample_rate,
        }
    }

    fn split(low_key: u8, high_key: u8, sample: SampleRef) -> Split {
        Split {
            low_key,
            high_key,
            root_key: low_key,
            sample,
            envelope: Envelope {
                attack: 0,
                decay: 0,
                sustain: 0,
                release: 0,
            },
        }
    }

    #[test]
    fn test_lookup_first_matching_split() {
        let mut bank = MemoryBank::new();
        let low = bank.add_sample(sample(32728));
        let high = bank.add_sample(sample(16364));
        bank.add_split(3, split(0, 59, low));
        bank.add_split(3, split(48, 127, high));

        let instrument = bank.lookup_instrument(3, 50).expect("instrument");
        assert_eq!(low, instrument.sample);
        assert_eq!(512, instrument.base_timer);

        let instrument = bank.lookup_instrument(3, 60).expect("instrument");
        assert_eq!(high, instrument.sample);
        assert_eq!(48, instrument.root_key);
        assert_eq!(1024, instrument.base_timer);

        assert!(bank.lookup_instrument(3, 128).is_none());
        assert!(bank.lookup_instrument(3, -1).is_none());
        assert!(bank.lookup_instrument(4, 60).is_none());
        assert_eq!(1, bank.program_count());
        assert_eq!(2, bank.sample_count());
    }

    #[test]
    fn test_missing_or_silent_sample() {
        let mut bank = MemoryBank::new();
        let silent = bank.add_sample(sample(0));
        bank.add_split(0, split(0, 127, silent));
        bank.add_split(1, split(0, 127, SampleRef(9)));

        assert!(bank.lookup_instrument(0, 60).is_none());
        assert!(bank.lookup_instrument(1, 60).is_none());
        assert!(bank.sample_data(SampleRef(9)).is_none());
        assert!(bank.sample_data(silent).is_some());
    }
}
