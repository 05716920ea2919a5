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
use std::fmt;

use crate::{
    sequence::SongEvent,
    synth::{EnvelopeState, Mixer},
};

use super::track::Track;

/// A snapshot of the whole song for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SongState {
    pub tempo: u8,
    pub elapsed_ticks: u64,
    pub max_ticks: u64,
    pub tracks: Vec<TrackState>,
}

/// A snapshot of one track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    pub index: usize,
    /// File offset of the next event, or 0 past the end.
    pub position: u64,
    pub rest: u32,
    pub voice: u8,
    pub volume: u8,
    pub expression: u8,
    pub pitch_bend: u16,
    pub octave: u8,
    pub panpot: i8,
    /// Keys of the channels still holding a note.
    pub notes: Vec<u8>,
    /// Loudest left level among the track's channels, 0.0 to 1.0.
    pub left: f32,
    pub right: f32,
}

impl TrackState {
    pub(crate) fn capture(track: &Track, events: &[SongEvent], mixer: &Mixer) -> TrackState {
        let mut notes = Vec::new();
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for channel in mixer.owned_by(track.index()) {
            if channel.state() != EnvelopeState::Release {
                notes.push(channel.key());
            }
            let pan = f32::from(channel.panpot());
            let volume = f32::from(channel.volume()) / 127.0;
            left = left.max((-pan + 64.0) / 128.0 * volume);
            right = right.max((pan + 64.0) / 128.0 * volume);
        }

        TrackState {
            index: track.index(),
            position: events
                .get(track.cursor())
                .map(|event| event.offset)
                .unwrap_or(0),
            rest: track.rest(),
            voice: track.voice(),
            volume: track.volume(),
            expression: track.expression(),
            pitch_bend: track.pitch_bend(),
            octave: track.octave(),
            panpot: track.panpot(),
            notes,
            left,
            right,
        }
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>2} @{:#06x} rest={:<4} voice={:<3} vol={:<3} expr={:<3} pan={:<4} oct={} notes={:?}",
            self.index,
            self.position,
            self.rest,
            self.voice,
            self.volume,
            self.expression,
            self.panpot,
            self.octave,
            self.notes
        )
    }
}
