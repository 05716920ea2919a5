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
//! The channel pool and stereo mixer.

use std::time::Duration;

use tracing::debug;

use super::{
    channel::{Channel, EnvelopeState},
    tables::{channel_timer, channel_volume, ENVELOPE_FLOOR, SUSTAIN_TABLE},
};

/// Number of pooled channels.
pub const CHANNEL_COUNT: usize = 32;

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 65456;

/// Sequencer iterations per second.
pub const TICK_RATE: u32 = 192;

/// Stereo frames rendered per sequencer iteration.
pub const FRAMES_PER_TICK: usize = 341;

/// Exponent of the fade-out gain curve.
const FADE_CURVE: f32 = 10.0 / 6.0;

/// The per-track parameters a channel needs when it is ticked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackMix {
    pub volume: u8,
    pub expression: u8,
    pub panpot: i8,
}

/// Master fade state, counted in sequencer iterations.
#[derive(Debug, Default)]
struct Fade {
    active: bool,
    iterations_left: u64,
    position: f32,
    step: f32,
}

/// Owns every channel and mixes them into interleaved stereo.
pub struct Mixer {
    channels: Vec<Channel>,
    /// Muted track indices.
    mutes: Vec<bool>,
    fade: Fade,
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer::new()
    }
}

impl Mixer {
    /// Creates a mixer with an idle channel pool.
    pub fn new() -> Mixer {
        Mixer {
            channels: (0..CHANNEL_COUNT).map(Channel::new).collect(),
            mutes: Vec::new(),
            fade: Fade::default(),
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut Channel {
        &mut self.channels[index]
    }

    /// Picks the channel to use for a new note: idle first, then releasing, then the
    /// quietest. Exact ties go to the later channel.
    pub fn allocate_channel(&self) -> usize {
        fn score(channel: &Channel) -> i32 {
            if channel.owner().is_none() {
                -2
            } else if channel.state() == EnvelopeState::Release {
                -1
            } else {
                0
            }
        }

        let mut best = 0;
        for (index, channel) in self.channels.iter().enumerate().skip(1) {
            let current = &self.channels[best];
            let (best_score, score) = (score(current), score(channel));
            if score < best_score || (score == best_score && channel.volume() <= current.volume())
            {
                best = index;
            }
        }
        best
    }

    /// Channels currently playing for the given track.
    pub fn owned_by(&self, track: usize) -> impl Iterator<Item = &Channel> + '_ {
        self.channels
            .iter()
            .filter(move |channel| channel.owner() == Some(track))
    }

    /// True if the track has any channel playing.
    pub fn has_channels(&self, track: usize) -> bool {
        self.owned_by(track).next().is_some()
    }

    /// Counts down the note length of every channel the track owns.
    pub fn tick_notes(&mut self, track: usize) {
        self.channels
            .iter_mut()
            .filter(|channel| channel.owner() == Some(track))
            .for_each(Channel::tick_note);
    }

    /// Stops every channel the track owns.
    pub fn stop_owned_by(&mut self, track: usize) {
        self.channels
            .iter_mut()
            .filter(|channel| channel.owner() == Some(track))
            .for_each(Channel::stop);
    }

    /// Stops every channel.
    pub fn stop_all(&mut self) {
        self.channels.iter_mut().for_each(Channel::stop);
    }

    /// Mutes or unmutes a track. Muted tracks keep playing silently.
    pub fn set_mute(&mut self, track: usize, muted: bool) {
        if self.mutes.len() <= track {
            self.mutes.resize(track + 1, false);
        }
        self.mutes[track] = muted;
    }

    pub fn is_muted(&self, track: usize) -> bool {
        self.mutes.get(track).copied().unwrap_or(false)
    }

    /// Steps envelopes and recomputes volume, pan, and rate for every playing channel.
    pub fn channel_tick<F>(&mut self, track_mix: F)
    where
        F: Fn(usize) -> Option<TrackMix>,
    {
        for channel in self.channels.iter_mut() {
            let Some(owner) = channel.owner() else {
                continue;
            };
            let Some(mix) = track_mix(owner) else {
                channel.stop();
                continue;
            };

            channel.step_envelope();
            if channel.note_length() == 0 && channel.state() != EnvelopeState::Release {
                channel.release();
            }

            let level = SUSTAIN_TABLE[usize::from(channel.note_velocity().min(0x7F))]
                + channel.velocity()
                + SUSTAIN_TABLE[usize::from(mix.volume.min(0x7F))]
                + SUSTAIN_TABLE[usize::from(mix.expression.min(0x7F))];
            let pitch = (i32::from(channel.key()) - i32::from(channel.root_key())) << 6;

            if channel.state() == EnvelopeState::Release && level <= ENVELOPE_FLOOR {
                debug!(channel = channel.index(), track = owner, "Channel released");
                channel.stop();
            } else {
                channel.set_output(
                    channel_volume(level),
                    mix.panpot,
                    channel_timer(channel.base_timer(), pitch),
                );
            }
        }
    }

    /// Starts fading the master level to silence over the given duration.
    pub fn begin_fade_out(&mut self, duration: Duration) {
        let iterations = (duration.as_secs_f64() * f64::from(TICK_RATE)) as u64;
        self.fade = Fade {
            active: true,
            iterations_left: iterations,
            position: 1.0,
            step: if iterations == 0 {
                -1.0
            } else {
                -1.0 / iterations as f32
            },
        };
    }

    pub fn is_fading(&self) -> bool {
        self.fade.active
    }

    /// True once a started fade has reached silence.
    pub fn is_fade_done(&self) -> bool {
        self.fade.active && self.fade.iterations_left == 0
    }

    pub fn reset_fade(&mut self) {
        self.fade = Fade::default();
    }

    /// Renders one sequencer iteration of interleaved stereo into `output`, which must hold
    /// `FRAMES_PER_TICK * 2` samples.
    pub fn process(&mut self, output: &mut [i16]) {
        let (mut level, step) = self.master_ramp();

        for frame in output.chunks_exact_mut(2).take(FRAMES_PER_TICK) {
            let mut left: i32 = 0;
            let mut right: i32 = 0;
            for channel in self.channels.iter_mut() {
                let Some(owner) = channel.owner() else {
                    continue;
                };
                let muted = self.mutes.get(owner).copied().unwrap_or(false);
                let (channel_left, channel_right) = channel.process();
                if !muted {
                    left += i32::from(channel_left);
                    right += i32::from(channel_right);
                }
            }
            frame[0] = to_i16(left as f32 * level);
            frame[1] = to_i16(right as f32 * level);
            level += step;
        }
    }

    /// Starting master level and per-frame step for the next iteration.
    fn master_ramp(&mut self) -> (f32, f32) {
        let fade = &mut self.fade;
        if fade.active && fade.iterations_left == 0 {
            return (0.0, 0.0);
        }

        let mut from = 1.0f32;
        let mut to = 1.0f32;
        if fade.iterations_left > 0 {
            from = curve(fade.position);
            fade.position += fade.step;
            to = curve(fade.position);
            fade.iterations_left -= 1;
        }
        (from, (to - from) / FRAMES_PER_TICK as f32)
    }
}

fn curve(position: f32) -> f32 {
    if position < 0.0 {
        0.0
    } else {
        position.powf(FADE_CURVE)
    }
}

fn to_i16(value: f32) -> i16 {
    value.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

#[cfg(test)]
mod test {
    use crate::test::test_bank;

    use super::*;

    const FULL: TrackMix = TrackMix {
        volume: 0x7F,
        expression: 0x7F,
        panpot: 0,
    };

    fn start_note(mixer: &mut Mixer, track: usize, key: i32, length: u32) -> usize {
        let bank = test_bank();
        let index = mixer.allocate_channel();
        let channel = mixer.channel_mut(index);
        channel.stop();
        assert!(channel.start(bank.as_ref(), 0, key, length));
        channel.set_owner(track, 0x7F);
        index
    }

    #[test]
    fn test_allocation_prefers_idle_then_releasing_then_quiet() {
        let mut mixer = Mixer::new();
        // All idle with equal volume: the last channel wins the tie.
        assert_eq!(CHANNEL_COUNT - 1, mixer.allocate_channel());

        for _ in 0..CHANNEL_COUNT {
            start_note(&mut mixer, 0, 60, 100);
        }
        assert_eq!(CHANNEL_COUNT, mixer.owned_by(0).count());

        mixer.channel_tick(|_| Some(FULL));
        mixer.channel_mut(5).set_output(10, 0, 512);
        assert_eq!(5, mixer.allocate_channel());

        mixer.channel_mut(9).release();
        assert_eq!(9, mixer.allocate_channel());

        mixer.channel_mut(20).stop();
        assert_eq!(20, mixer.allocate_channel());
    }

    #[test]
    fn test_note_length_triggers_release_and_stop() {
        let mut mixer = Mixer::new();
        let index = start_note(&mut mixer, 2, 60, 2);

        mixer.channel_tick(|_| Some(FULL));
        assert_eq!(EnvelopeState::Decay, mixer.channels()[index].state());
        assert!(mixer.channels()[index].volume() > 0);
        assert_eq!(512, mixer.channels()[index].timer());

        mixer.tick_notes(2);
        mixer.tick_notes(2);
        mixer.channel_tick(|_| Some(FULL));
        assert_eq!(EnvelopeState::Release, mixer.channels()[index].state());

        for _ in 0..4 {
            mixer.channel_tick(|_| Some(FULL));
        }
        assert!(!mixer.has_channels(2));
    }

    #[test]
    fn test_pitch_follows_key() {
        let mut mixer = Mixer::new();
        let up = start_note(&mut mixer, 0, 72, 100);
        let down = start_note(&mut mixer, 0, 48, 100);
        mixer.channel_tick(|_| Some(FULL));
        assert_eq!(256, mixer.channels()[up].timer());
        assert_eq!(1024, mixer.channels()[down].timer());
    }

    #[test]
    fn test_mix_and_mute() {
        let mut mixer = Mixer::new();
        start_note(&mut mixer, 0, 60, 100);
        start_note(&mut mixer, 1, 60, 100);
        mixer.channel_tick(|_| Some(FULL));

        let mut output = vec![0i16; FRAMES_PER_TICK * 2];
        mixer.process(&mut output);
        // The first frame has no sample due yet at this rate.
        assert_eq!(&[0, 0, 8000, 8000], &output[..4]);

        mixer.set_mute(1, true);
        assert!(mixer.is_muted(1));
        mixer.process(&mut output);
        assert_eq!(4000, output[0]);
        assert!(mixer.has_channels(1));
    }

    #[test]
    fn test_fade_out() {
        let mut mixer = Mixer::new();
        start_note(&mut mixer, 0, 60, 10_000);
        mixer.channel_tick(|_| Some(FULL));
        assert!(!mixer.is_fading());

        mixer.begin_fade_out(Duration::from_millis(50));
        assert!(mixer.is_fading());
        let mut output = vec![0i16; FRAMES_PER_TICK * 2];
        let mut peaks = Vec::new();
        while !mixer.is_fade_done() {
            mixer.process(&mut output);
            peaks.push(output.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0));
        }
        assert_eq!(9, peaks.len());
        assert!(peaks.windows(2).all(|w| w[0] >= w[1]));

        mixer.process(&mut output);
        assert!(output.iter().all(|s| *s == 0));

        mixer.reset_fade();
        assert!(!mixer.is_fading());
        mixer.process(&mut output);
        assert_eq!(Some(4000), output.iter().map(|s| s.unsigned_abs()).max());
    }

    #[test]
    fn test_orphaned_channels_stop() {
        let mut mixer = Mixer::new();
        start_note(&mut mixer, 7, 60, 100);
        mixer.channel_tick(|track| if track == 7 { None } else { Some(FULL) });
        assert!(!mixer.has_channels(7));
    }
}
