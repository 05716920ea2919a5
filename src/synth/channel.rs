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
//! A single synthesis channel: envelope plus sample decoder.

use std::sync::Arc;

use crate::bank::{SampleBank, SampleData, SampleFormat};

use super::{
    adpcm::AdpcmDecoder,
    tables::{ATTACK_TABLE, DECAY_TABLE, ENVELOPE_FLOOR, SUSTAIN_TABLE},
};

/// Phase added to the sample position for every output frame.
const PHASE_STEP: i32 = 0x100;

/// The envelope stage of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// A pooled synthesis channel. Channels are never freed, only stopped and reused.
pub struct Channel {
    index: usize,
    /// Index of the track that started the current note.
    owner: Option<usize>,
    state: EnvelopeState,
    root_key: u8,
    key: u8,
    note_velocity: u8,
    panpot: i8,
    /// Envelope level, from the floor up to 0.
    velocity: i32,
    volume: u8,
    base_timer: u16,
    timer: u16,
    /// Ticks left before the note is released.
    note_length: u32,

    attack: u8,
    decay: u16,
    sustain: i32,
    release: u16,

    pos: i32,
    prev_left: i16,
    prev_right: i16,

    sample: Option<Arc<SampleData>>,
    /// Read position for PCM samples.
    data_offset: usize,
    adpcm: AdpcmDecoder,
    adpcm_loop_last_sample: i16,
    adpcm_loop_step_index: i16,
}

impl Channel {
    /// Creates an idle channel.
    pub fn new(index: usize) -> Channel {
        Channel {
            index,
            owner: None,
            state: EnvelopeState::Release,
            root_key: 0,
            key: 0,
            note_velocity: 0,
            panpot: 0,
            velocity: ENVELOPE_FLOOR,
            volume: 0,
            base_timer: 0,
            timer: 0,
            note_length: 0,
            attack: 0,
            decay: 0,
            sustain: 0,
            release: 0,
            pos: 0,
            prev_left: 0,
            prev_right: 0,
            sample: None,
            data_offset: 0,
            adpcm: AdpcmDecoder::new(&[]),
            adpcm_loop_last_sample: 0,
            adpcm_loop_step_index: 0,
        }
    }

    /// Starts a note. Returns false and leaves the channel idle if the bank has nothing
    /// for this voice and key.
    pub fn start(&mut self, bank: &dyn SampleBank, voice: u8, key: i32, note_length: u32) -> bool {
        let Some(instrument) = bank.lookup_instrument(voice, key) else {
            return false;
        };
        let Some(sample) = bank.sample_data(instrument.sample) else {
            return false;
        };

        let envelope = instrument.envelope;
        self.key = key.clamp(0, i32::from(u8::MAX)) as u8;
        self.root_key = instrument.root_key;
        self.base_timer = instrument.base_timer;
        self.attack = ATTACK_TABLE[usize::from(0x7F - envelope.attack.min(0x7F))];
        self.decay = DECAY_TABLE[usize::from(0x7F - envelope.decay.min(0x7F))];
        self.sustain = SUSTAIN_TABLE[usize::from(envelope.sustain.min(0x7F))];
        self.release = DECAY_TABLE[usize::from(0x7F - envelope.release.min(0x7F))];

        self.data_offset = 0;
        if sample.format == SampleFormat::Adpcm {
            self.adpcm = AdpcmDecoder::new(&sample.data);
            self.adpcm_loop_last_sample = self.adpcm.last_sample;
            self.adpcm_loop_step_index = self.adpcm.step_index;
        }
        self.sample = Some(sample);

        self.state = EnvelopeState::Attack;
        self.velocity = ENVELOPE_FLOOR;
        self.pos = 0;
        self.prev_left = 0;
        self.prev_right = 0;
        self.note_length = note_length;
        true
    }

    /// Releases the channel back to the pool.
    pub fn stop(&mut self) {
        self.owner = None;
        self.volume = 0;
    }

    /// Advances the envelope by one tick.
    pub fn step_envelope(&mut self) {
        match self.state {
            EnvelopeState::Attack => {
                self.velocity = i32::from(self.attack) * self.velocity / 0xFF;
                if self.velocity == 0 {
                    self.state = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                self.velocity -= i32::from(self.decay);
                if self.velocity <= self.sustain {
                    self.state = EnvelopeState::Sustain;
                    self.velocity = self.sustain;
                }
            }
            EnvelopeState::Sustain => {}
            EnvelopeState::Release => {
                self.velocity = (self.velocity - i32::from(self.release)).max(ENVELOPE_FLOOR);
            }
        }
    }

    /// Renders one output frame. Returns the held previous frame when no new raw sample is due.
    pub fn process(&mut self) -> (i16, i16) {
        if self.timer == 0 {
            return (self.prev_left, self.prev_right);
        }
        // Moved out for the frame and put back below, so the hot path never touches the
        // reference count.
        let Some(sample) = self.sample.take() else {
            return (self.prev_left, self.prev_right);
        };
        let frame = self.render_frame(&sample);
        self.sample = Some(sample);
        frame
    }

    fn render_frame(&mut self, sample: &SampleData) -> (i16, i16) {
        let timer = i32::from(self.timer);
        let num_samples = (self.pos + PHASE_STEP) / timer;
        self.pos = (self.pos + PHASE_STEP) % timer;

        for _ in 0..num_samples {
            let raw = match self.next_raw_sample(sample) {
                Some(raw) => raw,
                None => {
                    self.prev_left = 0;
                    self.prev_right = 0;
                    self.stop();
                    return (0, 0);
                }
            };
            let scaled = i32::from(raw) * i32::from(self.volume) / 0x7F;
            let pan = i32::from(self.panpot);
            self.prev_left = (scaled * (-pan + 0x40) / 0x80) as i16;
            self.prev_right = (scaled * (pan + 0x40) / 0x80) as i16;
        }

        (self.prev_left, self.prev_right)
    }

    /// Reads the next raw sample, looping as needed. None once a non-looping sample ends.
    fn next_raw_sample(&mut self, sample: &SampleData) -> Option<i16> {
        let data = &sample.data;
        let loop_offset = sample.loop_offset();
        let can_loop = sample.looped && loop_offset < data.len();

        match sample.format {
            SampleFormat::Pcm8 => {
                if self.data_offset >= data.len() {
                    if !can_loop {
                        return None;
                    }
                    self.data_offset = loop_offset;
                }
                let raw = (data[self.data_offset] as i8 as i16) << 8;
                self.data_offset += 1;
                Some(raw)
            }
            SampleFormat::Pcm16 => {
                if self.data_offset + 2 > data.len() {
                    if !can_loop || loop_offset + 2 > data.len() {
                        return None;
                    }
                    self.data_offset = loop_offset;
                }
                let raw = i16::from_le_bytes([data[self.data_offset], data[self.data_offset + 1]]);
                self.data_offset += 2;
                Some(raw)
            }
            SampleFormat::Adpcm => {
                // Snapshot predictor state on the first pass through the loop point so every
                // later pass resumes from identical state.
                if self.adpcm.data_offset == loop_offset && !self.adpcm.on_second_nibble {
                    self.adpcm_loop_last_sample = self.adpcm.last_sample;
                    self.adpcm_loop_step_index = self.adpcm.step_index;
                }
                if self.adpcm.at_end(data) {
                    if !can_loop {
                        return None;
                    }
                    self.adpcm.data_offset = loop_offset;
                    self.adpcm.step_index = self.adpcm_loop_step_index;
                    self.adpcm.last_sample = self.adpcm_loop_last_sample;
                    self.adpcm.on_second_nibble = false;
                }
                Some(self.adpcm.next_sample(data))
            }
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The owning track, if the channel is playing.
    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: usize, note_velocity: u8) {
        self.owner = Some(owner);
        self.note_velocity = note_velocity;
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub(crate) fn release(&mut self) {
        self.state = EnvelopeState::Release;
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn root_key(&self) -> u8 {
        self.root_key
    }

    pub fn note_velocity(&self) -> u8 {
        self.note_velocity
    }

    pub fn velocity(&self) -> i32 {
        self.velocity
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn panpot(&self) -> i8 {
        self.panpot
    }

    pub fn base_timer(&self) -> u16 {
        self.base_timer
    }

    pub fn timer(&self) -> u16 {
        self.timer
    }

    pub fn note_length(&self) -> u32 {
        self.note_length
    }

    /// Counts down the note length by one tick.
    pub(crate) fn tick_note(&mut self) {
        if self.note_length > 0 {
            self.note_length -= 1;
        }
    }

    /// Applies the per-tick mix parameters.
    pub(crate) fn set_output(&mut self, volume: u8, panpot: i8, timer: u16) {
        self.volume = volume;
        self.panpot = panpot;
        self.timer = timer;
    }
}
