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
//! Fixed lookup tables for the envelope and sample decoders.

/// Clock the sample timers count against.
pub const ARM7_CLOCK: u32 = 16_756_991;

/// The lowest envelope level. Anything at or below this is silent.
pub const ENVELOPE_FLOOR: i32 = -92_544;

/// Multiplicative attack rates, indexed by `0x7F - attack`.
pub const ATTACK_TABLE: [u8; 128] = [
    255, 254, 253, 252, 251, 250, 249, 248, 247, 246, 245, 244, 243, 242, 241, 240,
    239, 238, 237, 236, 235, 234, 233, 232, 231, 230, 229, 228, 227, 226, 225, 224,
    223, 222, 221, 220, 219, 218, 217, 216, 215, 214, 213, 212, 211, 210, 209, 208,
    207, 206, 205, 204, 203, 202, 201, 200, 199, 198, 197, 196, 195, 194, 193, 192,
    191, 190, 189, 188, 187, 186, 185, 184, 183, 182, 181, 180, 179, 178, 177, 176,
    175, 174, 173, 172, 171, 170, 169, 168, 167, 166, 165, 164, 163, 162, 161, 160,
    159, 158, 157, 156, 155, 154, 153, 152, 151, 150, 149, 148, 147, 143, 137, 132,
    127, 123, 116, 109, 100, 92, 84, 73, 63, 51, 38, 26, 14, 5, 1, 0,
];

/// Linear decay and release rates, indexed by `0x7F - rate`.
pub const DECAY_TABLE: [u16; 128] = [
    1, 3, 5, 7, 9, 11, 13, 15, 17, 19, 21, 23, 25, 27, 29, 31,
    33, 35, 37, 39, 41, 43, 45, 47, 49, 51, 53, 55, 57, 59, 61, 63,
    65, 67, 69, 71, 73, 75, 77, 79, 81, 83, 85, 87, 89, 91, 93, 95,
    97, 99, 101, 102, 104, 105, 107, 108, 110, 111, 113, 115, 116, 118, 120, 122,
    124, 126, 128, 130, 132, 135, 137, 140, 142, 145, 148, 151, 154, 157, 160, 163,
    167, 171, 175, 179, 183, 187, 192, 197, 202, 208, 213, 219, 226, 233, 240, 248,
    256, 265, 274, 284, 295, 307, 320, 334, 349, 366, 384, 404, 427, 452, 480, 512,
    549, 591, 640, 698, 768, 853, 960, 1097, 1280, 1536, 1920, 2560, 3840, 7680, 15360, 65535,
];

/// Envelope levels for the 0-127 parameter range.
pub const SUSTAIN_TABLE: [i32; 128] = [
    -92544, -92416, -92288, -83328, -76928, -71936, -67840, -64384,
    -61440, -58880, -56576, -54400, -52480, -50688, -49024, -47488,
    -46080, -44672, -43392, -42240, -41088, -40064, -39040, -38016,
    -36992, -36096, -35328, -34432, -33664, -32896, -32128, -31360,
    -30592, -29952, -29312, -28672, -28032, -27392, -26880, -26240,
    -25728, -25088, -24576, -24064, -23552, -23040, -22528, -22144,
    -21632, -21120, -20736, -20224, -19840, -19456, -19072, -18560,
    -18176, -17792, -17408, -17024, -16640, -16256, -16000, -15616,
    -15232, -14848, -14592, -14208, -13952, -13568, -13184, -12928,
    -12672, -12288, -12032, -11648, -11392, -11136, -10880, -10496,
    -10240, -9984, -9728, -9472, -9216, -8960, -8704, -8448,
    -8192, -7936, -7680, -7424, -7168, -6912, -6656, -6400,
    -6272, -6016, -5760, -5504, -5376, -5120, -4864, -4608,
    -4480, -4224, -3968, -3840, -3584, -3456, -3200, -2944,
    -2816, -2560, -2432, -2176, -2048, -1792, -1664, -1408,
    -1280, -1024, -896, -768, -512, -384, -128, 0,
];

/// IMA ADPCM step sizes.
pub const ADPCM_STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21,
    23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209,
    230, 253, 279, 307, 337, 371, 408, 449, 494, 544, 598, 658,
    724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484,
    7132, 7845, 8630, 9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350,
    22385, 24623, 27086, 29794, 32767,
];

/// IMA ADPCM step index adjustments, indexed by the low 3 bits of a nibble.
pub const ADPCM_INDEX_TABLE: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

/// Pitch steps per octave in the timer table.
const PITCH_STEPS: i32 = 0x300;

/// Converts an envelope-summed level into a linear channel volume (0-127).
///
/// The level is in 1/128 steps of a tenth of a decibel, floored at -72.3 dB.
pub fn channel_volume(level: i32) -> u8 {
    let tenths = (level / 0x80).clamp(-723, 0);
    (127.0 * 10f64.powf(f64::from(tenths) / 200.0)).round() as u8
}

/// Fractional part of `2^(index/768)` in 16.16 fixed point.
fn pitch_table(index: i32) -> u64 {
    ((2f64.powf(f64::from(index) / f64::from(PITCH_STEPS)) - 1.0) * 65536.0) as u64
}

/// Scales a base timer by a pitch offset in 1/64 semitones. A higher pitch shortens the timer.
pub fn channel_timer(base_timer: u16, pitch: i32) -> u16 {
    let mut shift: i32 = 0;
    let mut pitch = -pitch;
    while pitch < 0 {
        shift -= 1;
        pitch += PITCH_STEPS;
    }
    while pitch >= PITCH_STEPS {
        shift += 1;
        pitch -= PITCH_STEPS;
    }

    let mut timer = (pitch_table(pitch) + 0x10000) * u64::from(base_timer);
    shift -= 16;
    if shift <= 0 {
        timer >>= -shift;
    } else if shift < 32 {
        if timer & (u64::MAX << (32 - shift)) != 0 {
            return u16::MAX;
        }
        timer <<= shift;
    } else {
        return u16::MAX;
    }

    timer.clamp(0x10, u64::from(u16::MAX)) as u16
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tables_are_monotonic() {
        assert!(ATTACK_TABLE.windows(2).all(|w| w[0] > w[1]));
        assert!(DECAY_TABLE.windows(2).all(|w| w[0] < w[1]));
        assert!(SUSTAIN_TABLE.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ENVELOPE_FLOOR, SUSTAIN_TABLE[0]);
        assert_eq!(0, SUSTAIN_TABLE[127]);
    }

    #[test]
    fn test_channel_volume() {
        assert_eq!(127, channel_volume(0));
        assert_eq!(127, channel_volume(1000));
        assert_eq!(0, channel_volume(ENVELOPE_FLOOR));
        assert_eq!(0, channel_volume(ENVELOPE_FLOOR * 4));
        // -6 dB is roughly half.
        assert_eq!(64, channel_volume(-60 * 0x80));
    }

    #[test]
    fn test_channel_timer() {
        assert_eq!(512, channel_timer(512, 0));
        // An octave up halves the timer, an octave down doubles it.
        assert_eq!(256, channel_timer(512, 12 << 6));
        assert_eq!(1024, channel_timer(512, -(12 << 6)));
        assert_eq!(0x10, channel_timer(512, 120 << 6));
        assert_eq!(u16::MAX, channel_timer(0x8000, -(24 << 6)));
        // A semitone up is about 6% faster.
        assert_eq!(483, channel_timer(512, 1 << 6));
    }
}
