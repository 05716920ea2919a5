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
use crate::synth::{Mixer, TrackMix};

/// Octave a track starts in.
const DEFAULT_OCTAVE: u8 = 4;

/// Performance state of one sequence track. The channels a track plays on belong to the
/// mixer; a track finds them by its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub(crate) index: usize,
    /// Index into the track's event list.
    pub(crate) cursor: usize,
    pub(crate) rest: u32,
    pub(crate) stopped: bool,
    pub(crate) octave: u8,
    pub(crate) voice: u8,
    pub(crate) volume: u8,
    pub(crate) expression: u8,
    pub(crate) panpot: i8,
    pub(crate) pitch_bend: u16,
    /// Offset of the event a Finish jumps back to.
    pub(crate) loop_offset: Option<u64>,
}

impl Track {
    pub fn new(index: usize) -> Track {
        Track {
            index,
            cursor: 0,
            rest: 0,
            stopped: false,
            octave: DEFAULT_OCTAVE,
            voice: 0,
            volume: 0,
            expression: 0,
            panpot: 0,
            pitch_bend: 0,
            loop_offset: None,
        }
    }

    /// Resets to the start of the track and silences its channels.
    pub fn init(&mut self, mixer: &mut Mixer) {
        *self = Track::new(self.index);
        mixer.stop_owned_by(self.index);
    }

    /// Counts down the current rest and the note lengths of this track's channels.
    pub fn tick(&mut self, mixer: &mut Mixer) {
        if self.rest > 0 {
            self.rest -= 1;
        }
        mixer.tick_notes(self.index);
    }

    /// The parameters the mixer applies to this track's channels.
    pub fn mix(&self) -> TrackMix {
        TrackMix {
            volume: self.volume,
            expression: self.expression,
            panpot: self.panpot,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn rest(&self) -> u32 {
        self.rest
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    pub fn voice(&self) -> u8 {
        self.voice
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn expression(&self) -> u8 {
        self.expression
    }

    pub fn panpot(&self) -> i8 {
        self.panpot
    }

    pub fn pitch_bend(&self) -> u16 {
        self.pitch_bend
    }

    pub fn loop_offset(&self) -> Option<u64> {
        self.loop_offset
    }
}
