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
use super::tables::{ADPCM_INDEX_TABLE, ADPCM_STEP_TABLE};

/// Size of the block header holding the initial predictor state.
pub const ADPCM_HEADER_SIZE: usize = 4;

/// IMA ADPCM decoder state. The sample bytes are passed in on every call so the decoder
/// itself stays a small copyable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmDecoder {
    /// Byte offset of the next nibble pair.
    pub data_offset: usize,
    pub last_sample: i16,
    pub step_index: i16,
    /// True when the high nibble of the current byte is next.
    pub on_second_nibble: bool,
}

impl AdpcmDecoder {
    /// Reads the block header: the initial sample, then the initial step index.
    pub fn new(data: &[u8]) -> AdpcmDecoder {
        let (last_sample, step_index) = match data {
            [s0, s1, i0, i1, ..] => (
                i16::from_le_bytes([*s0, *s1]),
                (u16::from_le_bytes([*i0, *i1]) & 0x7F) as i16,
            ),
            _ => (0, 0),
        };
        AdpcmDecoder {
            data_offset: ADPCM_HEADER_SIZE,
            last_sample,
            step_index: step_index.min(ADPCM_STEP_TABLE.len() as i16 - 1),
            on_second_nibble: false,
        }
    }

    /// True when every nibble has been consumed.
    pub fn at_end(&self, data: &[u8]) -> bool {
        self.data_offset >= data.len() && !self.on_second_nibble
    }

    /// Decodes the next nibble.
    pub fn next_sample(&mut self, data: &[u8]) -> i16 {
        let Some(byte) = data.get(self.data_offset) else {
            return self.last_sample;
        };
        let nibble = if self.on_second_nibble {
            byte >> 4
        } else {
            byte & 0x0F
        };

        let step = ADPCM_STEP_TABLE[self.step_index as usize];
        let mut diff = step / 8;
        if nibble & 1 != 0 {
            diff += step / 4;
        }
        if nibble & 2 != 0 {
            diff += step / 2;
        }
        if nibble & 4 != 0 {
            diff += step;
        }
        let sample = if nibble & 8 != 0 {
            i32::from(self.last_sample) - diff
        } else {
            i32::from(self.last_sample) + diff
        };
        self.last_sample = sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;

        let index = i32::from(self.step_index) + ADPCM_INDEX_TABLE[usize::from(nibble & 7)];
        self.step_index = index.clamp(0, ADPCM_STEP_TABLE.len() as i32 - 1) as i16;

        if self.on_second_nibble {
            self.data_offset += 1;
        }
        self.on_second_nibble = !self.on_second_nibble;
        self.last_sample
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header() {
        let decoder = AdpcmDecoder::new(&[0x10, 0xFF, 0x85, 0x00, 0x00]);
        assert_eq!(-240, decoder.last_sample);
        // The step index is masked to 7 bits.
        assert_eq!(5, decoder.step_index);
        assert_eq!(ADPCM_HEADER_SIZE, decoder.data_offset);
        assert!(!decoder.on_second_nibble);

        let empty = AdpcmDecoder::new(&[]);
        assert_eq!(0, empty.last_sample);
        assert!(empty.at_end(&[]));
    }

    #[test]
    fn test_nibble_order_and_steps() {
        // Low nibble 0x7 first, then high nibble 0x8.
        let data = [0, 0, 0, 0, 0x87];
        let mut decoder = AdpcmDecoder::new(&data);

        // step 7: 7/8 + 7/4 + 7/2 + 7 = 0 + 1 + 3 + 7
        assert_eq!(11, decoder.next_sample(&data));
        assert_eq!(8, decoder.step_index);
        assert!(decoder.on_second_nibble);
        assert_eq!(4, decoder.data_offset);

        // step 16: sign only, subtract 16/8.
        assert_eq!(9, decoder.next_sample(&data));
        assert_eq!(7, decoder.step_index);
        assert_eq!(5, decoder.data_offset);
        assert!(decoder.at_end(&data));
    }

    #[test]
    fn test_clamps() {
        let data = [0xFF, 0x7F, 88, 0, 0x77];
        let mut decoder = AdpcmDecoder::new(&data);
        assert_eq!(i16::MAX, decoder.next_sample(&data));
        assert_eq!(88, decoder.step_index);

        let data = [0x00, 0x80, 0, 0, 0x88];
        let mut decoder = AdpcmDecoder::new(&data);
        assert_eq!(i16::MIN, decoder.next_sample(&data));
        assert_eq!(0, decoder.step_index);
    }
}
