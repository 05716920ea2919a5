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
//! Sequencer state and the per-iteration tick logic, independent of any thread or device.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    bank::SampleBank,
    sequence::{Command, SongEvent},
    sink::AudioSink,
    synth::{Mixer, FRAMES_PER_TICK},
};

use super::{
    error::PlayerError,
    state::{SongState, TrackState},
    track::Track,
};

/// Tempo accumulated per sequencer tick.
const TEMPO_THRESHOLD: u32 = 240;

const DEFAULT_TEMPO: u8 = 120;

/// How playback behaves once the song reaches its loop point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackContext {
    /// Loops to play before fading out.
    pub loop_threshold: u64,
    /// Fade out and end the song after the loop threshold instead of looping forever.
    pub playlist_active: bool,
    pub fade_out: Duration,
}

impl Default for PlaybackContext {
    fn default() -> Self {
        PlaybackContext {
            loop_threshold: 2,
            playlist_active: false,
            fade_out: Duration::from_secs(10),
        }
    }
}

/// Plays a parsed song through the mixer.
pub struct Engine {
    bank: Arc<dyn SampleBank>,
    context: PlaybackContext,
    mixer: Mixer,
    /// Event lists, one per track, sorted by offset and annotated with ticks.
    events: Vec<Vec<SongEvent>>,
    tracks: Vec<Track>,
    /// Length in ticks of each track's first pass.
    track_lengths: Vec<u64>,
    loaded: bool,
    tempo: u8,
    tempo_stack: u32,
    elapsed_ticks: u64,
    max_ticks: u64,
    longest_track: usize,
    elapsed_loops: u64,
    fade_out_began: bool,
    /// Ticks advanced since the last reset. Never rewinds on loops.
    ticks_played: u64,
}

impl Engine {
    pub fn new(bank: Arc<dyn SampleBank>, context: PlaybackContext) -> Engine {
        Engine {
            bank,
            context,
            mixer: Mixer::new(),
            events: Vec::new(),
            tracks: Vec::new(),
            track_lengths: Vec::new(),
            loaded: false,
            tempo: DEFAULT_TEMPO,
            tempo_stack: 0,
            elapsed_ticks: 0,
            max_ticks: 0,
            longest_track: 0,
            elapsed_loops: 0,
            fade_out_began: false,
            ticks_played: 0,
        }
    }

    /// Replaces the current song. On error nothing is loaded.
    pub fn load(&mut self, events: Vec<Vec<SongEvent>>) -> Result<(), PlayerError> {
        self.mixer.stop_all();
        self.tracks = (0..events.len()).map(Track::new).collect();
        self.track_lengths = vec![0; events.len()];
        self.events = events;
        self.loaded = false;

        if let Err(e) = self.set_ticks() {
            self.unload();
            return Err(e);
        }
        self.init_emulation();
        self.loaded = true;

        info!(
            tracks = self.tracks.len(),
            max_ticks = self.max_ticks,
            longest_track = self.longest_track,
            "Loaded song"
        );
        Ok(())
    }

    pub fn unload(&mut self) {
        self.mixer.stop_all();
        self.events.clear();
        self.tracks.clear();
        self.track_lengths.clear();
        self.loaded = false;
        self.max_ticks = 0;
        self.longest_track = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Resets the sequencer to the start of the song.
    pub fn init_emulation(&mut self) {
        self.tempo = DEFAULT_TEMPO;
        self.tempo_stack = 0;
        self.elapsed_loops = 0;
        self.elapsed_ticks = 0;
        self.ticks_played = 0;
        self.fade_out_began = false;
        self.mixer.reset_fade();
        for track in self.tracks.iter_mut() {
            track.init(&mut self.mixer);
        }
    }

    /// Walks every track once without rendering, recording the tick each event first fires
    /// on and finding the longest track. Events that already carry a tick are kept as they
    /// are, so running this again changes nothing.
    pub fn set_ticks(&mut self) -> Result<(), PlayerError> {
        self.max_ticks = 0;
        self.longest_track = 0;

        for index in 0..self.tracks.len() {
            self.events[index].sort_by_key(|event| event.offset);
            self.tracks[index].init(&mut self.mixer);

            let annotated = self.events[index]
                .first()
                .is_some_and(|event| !event.ticks.is_empty());
            if !annotated {
                self.elapsed_ticks = 0;
                loop {
                    let cursor = self.tracks[index].cursor;
                    let Some(event) = self.events[index].get_mut(cursor) else {
                        break;
                    };
                    if !event.ticks.is_empty() {
                        break;
                    }
                    event.record_tick(self.elapsed_ticks);

                    self.execute_next(index)?;
                    let track = &mut self.tracks[index];
                    if track.stopped {
                        break;
                    }
                    self.elapsed_ticks += u64::from(track.rest);
                    track.rest = 0;
                }
                self.track_lengths[index] = self.elapsed_ticks;
            }

            if self.track_lengths[index] > self.max_ticks {
                self.max_ticks = self.track_lengths[index];
                self.longest_track = index;
            }
            self.mixer.stop_owned_by(index);
        }

        self.elapsed_ticks = 0;
        Ok(())
    }

    /// Executes the event under the track's cursor.
    pub fn execute_next(&mut self, index: usize) -> Result<(), PlayerError> {
        let track = &mut self.tracks[index];
        let events = &self.events[index];
        let Some(event) = events.get(track.cursor) else {
            track.stopped = true;
            return Ok(());
        };

        match &event.command {
            Command::Finish => {
                match track.loop_offset {
                    None => track.stopped = true,
                    Some(target) => {
                        track.cursor = events
                            .iter()
                            .position(|event| event.offset == target)
                            .ok_or(PlayerError::LoopTargetMissing {
                                track: index,
                                offset: target,
                            })?;
                    }
                }
                return Ok(());
            }
            Command::LoopStart { target } => track.loop_offset = Some(*target),
            Command::Rest { ticks } => track.rest = *ticks,
            Command::Note {
                key,
                octave_delta,
                velocity,
                duration,
            } => {
                let allocated = self.mixer.allocate_channel();
                let channel = self.mixer.channel_mut(allocated);
                channel.stop();

                track.octave = track.octave.wrapping_add_signed(*octave_delta);
                let key = i32::from(*key) + 12 * i32::from(track.octave);
                if channel.start(self.bank.as_ref(), track.voice, key, *duration) {
                    channel.set_owner(index, *velocity);
                } else {
                    debug!(
                        track = index,
                        voice = track.voice,
                        key,
                        "No instrument for note"
                    );
                }
            }
            Command::Tempo { bpm } => self.tempo = *bpm,
            Command::Voice { id } => track.voice = *id,
            Command::Volume { volume } => track.volume = *volume,
            Command::Expression { expression } => track.expression = *expression,
            Command::Panpot { panpot } => track.panpot = *panpot,
            Command::PitchBend { bend } => track.pitch_bend = *bend,
            Command::Octave { octave } => track.octave = *octave,
            Command::Unknown { .. } => {}
        }

        track.cursor += 1;
        Ok(())
    }

    /// Ticks one track and runs its events until it rests or stops.
    fn advance_track(&mut self, index: usize) -> Result<(), PlayerError> {
        self.tracks[index].tick(&mut self.mixer);

        // A loop with no rest in it would never yield.
        let limit = self.events[index].len() * 2 + 1;
        let mut executed = 0;
        while self.tracks[index].rest == 0 && !self.tracks[index].stopped {
            self.execute_next(index)?;
            executed += 1;
            if executed > limit {
                warn!(track = index, "Track loops without resting, stopping it");
                self.tracks[index].stopped = true;
            }
        }
        Ok(())
    }

    /// Runs one 192 Hz iteration: whatever sequencer ticks the tempo allows, then one block
    /// of `FRAMES_PER_TICK` stereo frames into `output`. Returns true when the song ended
    /// during this iteration, after which every channel is stopped.
    pub fn step(&mut self, output: &mut [i16]) -> Result<bool, PlayerError> {
        let mut ended = false;

        while self.tempo_stack >= TEMPO_THRESHOLD {
            self.tempo_stack -= TEMPO_THRESHOLD;
            self.ticks_played += 1;

            let mut all_done = true;
            for index in 0..self.tracks.len() {
                self.advance_track(index)?;
                if index == self.longest_track {
                    self.advance_elapsed(index);
                }
                if !self.tracks[index].stopped || self.mixer.has_channels(index) {
                    all_done = false;
                }
            }
            if self.fade_out_began && self.mixer.is_fade_done() {
                all_done = true;
            }

            if all_done {
                info!(
                    elapsed_ticks = self.elapsed_ticks,
                    loops = self.elapsed_loops,
                    "Song ended"
                );
                self.mixer.stop_all();
                ended = true;
                break;
            }
        }

        self.tempo_stack += u32::from(self.tempo);
        let tracks = &self.tracks;
        self.mixer
            .channel_tick(|owner| tracks.get(owner).map(Track::mix));
        self.mixer.process(output);
        Ok(ended)
    }

    /// Moves the elapsed counter along the longest track, rewinding it at the loop point.
    fn advance_elapsed(&mut self, index: usize) {
        if self.elapsed_ticks != self.max_ticks {
            self.elapsed_ticks += 1;
            return;
        }

        let track = &self.tracks[index];
        if track.stopped {
            return;
        }
        let resumed_at = self.events[index]
            .get(track.cursor)
            .and_then(|event| event.ticks.first())
            .copied();
        if let Some(tick) = resumed_at {
            self.elapsed_ticks = tick.saturating_sub(u64::from(track.rest));
        }
        self.elapsed_loops += 1;
        debug!(
            loops = self.elapsed_loops,
            elapsed_ticks = self.elapsed_ticks,
            "Song looped"
        );

        if self.context.playlist_active
            && !self.fade_out_began
            && self.elapsed_loops > self.context.loop_threshold
        {
            info!(
                loops = self.elapsed_loops,
                fade_out = ?self.context.fade_out,
                "Fading out"
            );
            self.fade_out_began = true;
            self.mixer.begin_fade_out(self.context.fade_out);
        }
    }

    /// Restarts the song and fast-forwards without rendering until `target` ticks have
    /// elapsed, then stops every channel. A target past the first loop point is never
    /// reached, so it is clamped to the song length.
    pub fn seek(&mut self, target: u64) -> Result<(), PlayerError> {
        let target = target.min(self.max_ticks);
        self.init_emulation();

        'seek: while self.elapsed_ticks < target {
            while self.tempo_stack >= TEMPO_THRESHOLD {
                self.tempo_stack -= TEMPO_THRESHOLD;
                self.ticks_played += 1;
                for index in 0..self.tracks.len() {
                    self.advance_track(index)?;
                }
                self.elapsed_ticks += 1;
                if self.elapsed_ticks >= target {
                    break 'seek;
                }
            }
            if self.tempo == 0 {
                warn!(elapsed_ticks = self.elapsed_ticks, "Tempo is zero, seek cannot advance");
                break;
            }
            self.tempo_stack += u32::from(self.tempo);
        }

        self.mixer.stop_all();
        debug!(target, elapsed_ticks = self.elapsed_ticks, "Seek complete");
        Ok(())
    }

    /// Plays the song from the start into a sink until it ends or `max_ticks` ticks have
    /// played. Returns the number of frames written.
    pub fn render(
        &mut self,
        sink: &mut dyn AudioSink,
        max_ticks: Option<u64>,
    ) -> Result<u64, PlayerError> {
        if !self.loaded {
            return Err(PlayerError::NoSong);
        }
        self.init_emulation();

        let mut buffer = vec![0i16; FRAMES_PER_TICK * 2];
        let mut frames = 0u64;
        loop {
            let ended = self.step(&mut buffer)?;
            sink.write(&buffer)?;
            frames += FRAMES_PER_TICK as u64;
            if ended || max_ticks.is_some_and(|limit| self.ticks_played >= limit) {
                break;
            }
            if self.tempo == 0 && self.tempo_stack < TEMPO_THRESHOLD {
                warn!(
                    ticks_played = self.ticks_played,
                    "Tempo is zero, render cannot advance"
                );
                break;
            }
        }
        sink.finish()?;
        Ok(frames)
    }

    /// Stops every channel without touching sequencer state.
    pub fn stop_all_channels(&mut self) {
        self.mixer.stop_all();
    }

    pub fn song_state(&self) -> SongState {
        SongState {
            tempo: self.tempo,
            elapsed_ticks: self.elapsed_ticks,
            max_ticks: self.max_ticks,
            tracks: self
                .tracks
                .iter()
                .zip(self.events.iter())
                .map(|(track, events)| TrackState::capture(track, events, &self.mixer))
                .collect(),
        }
    }

    pub fn set_mute(&mut self, track: usize, muted: bool) {
        self.mixer.set_mute(track, muted);
    }

    pub fn events(&self) -> &[Vec<SongEvent>] {
        &self.events
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn tempo(&self) -> u8 {
        self.tempo
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    pub fn longest_track(&self) -> usize {
        self.longest_track
    }

    pub fn elapsed_loops(&self) -> u64 {
        self.elapsed_loops
    }

    pub fn ticks_played(&self) -> u64 {
        self.ticks_played
    }
}

#[cfg(test)]
mod test {
    use crate::{
        sequence::SongEvent,
        test::{test_bank, CaptureSink},
    };

    use super::*;

    fn event(offset: u64, command: Command) -> SongEvent {
        SongEvent::new(offset, command)
    }

    fn note(key: u8, duration: u32) -> Command {
        Command::Note {
            key,
            octave_delta: 0,
            velocity: 100,
            duration,
        }
    }

    fn rest(ticks: u32) -> Command {
        Command::Rest { ticks }
    }

    fn engine(context: PlaybackContext) -> Engine {
        Engine::new(test_bank(), context)
    }

    /// Steps until the predicate holds, failing after a generous number of iterations.
    fn step_until<F>(engine: &mut Engine, predicate: F) -> bool
    where
        F: Fn(&Engine) -> bool,
    {
        let mut buffer = vec![0i16; FRAMES_PER_TICK * 2];
        for _ in 0..100_000 {
            if predicate(engine) {
                return false;
            }
            if engine.step(&mut buffer).expect("step") {
                return true;
            }
        }
        panic!("predicate never held");
    }

    /// Voice, volume, then a looping melody on track 0 and a short accompaniment on track 1.
    fn looping_song() -> Vec<Vec<SongEvent>> {
        vec![
            vec![
                event(0x80, Command::Voice { id: 0 }),
                event(0x82, Command::Volume { volume: 0x7F }),
                event(0x84, Command::Expression { expression: 0x7F }),
                event(0x86, Command::LoopStart { target: 0x87 }),
                event(0x87, note(0, 24)),
                event(0x89, rest(24)),
                event(0x8B, Command::Octave { octave: 5 }),
                event(0x8D, note(2, 12)),
                event(0x8F, rest(24)),
                event(0x91, Command::Finish),
            ],
            vec![
                event(0x100, Command::Voice { id: 0 }),
                event(0x102, Command::Volume { volume: 0x40 }),
                event(0x104, note(7, 30)),
                event(0x106, rest(30)),
                event(0x108, Command::Finish),
            ],
        ]
    }

    #[test]
    fn test_single_rest_track_stops_at_its_length() {
        let mut engine = engine(PlaybackContext::default());
        engine
            .load(vec![vec![event(0x80, rest(10)), event(0x82, Command::Finish)]])
            .expect("load");
        assert_eq!(10, engine.max_ticks());
        assert_eq!(vec![0], engine.events()[0][0].ticks);
        assert_eq!(vec![10], engine.events()[0][1].ticks);

        let mut buffer = vec![0i16; FRAMES_PER_TICK * 2];
        let mut stopped_at = None;
        let mut ended = false;
        while !ended {
            let before = engine.elapsed_ticks();
            ended = engine.step(&mut buffer).expect("step");
            if stopped_at.is_none() && engine.tracks()[0].is_stopped() {
                stopped_at = Some(before);
            }
        }
        assert_eq!(Some(10), stopped_at);
        assert_eq!(10, engine.elapsed_ticks());
    }

    #[test]
    fn test_set_ticks_records_first_tick_and_longest_track() {
        let mut engine = engine(PlaybackContext::default());
        engine.load(looping_song()).expect("load");

        let ticks: Vec<Vec<u64>> = engine.events()[0]
            .iter()
            .map(|event| event.ticks.clone())
            .collect();
        assert_eq!(
            vec![
                vec![0],
                vec![0],
                vec![0],
                vec![0],
                vec![0],
                vec![0],
                vec![24],
                vec![24],
                vec![24],
                vec![48],
            ],
            ticks
        );
        assert_eq!(48, engine.max_ticks());
        assert_eq!(0, engine.longest_track());
        assert_eq!(vec![30], engine.events()[1][4].ticks);
        assert!(engine.mixer().channels().iter().all(|c| c.owner().is_none()));
    }

    #[test]
    fn test_set_ticks_is_idempotent() {
        let mut engine = engine(PlaybackContext::default());
        engine.load(looping_song()).expect("load");
        let events = engine.events().to_vec();
        let max_ticks = engine.max_ticks();

        engine.set_ticks().expect("set ticks");
        assert_eq!(events, engine.events());
        assert_eq!(max_ticks, engine.max_ticks());
        assert_eq!(0, engine.longest_track());
    }

    #[test]
    fn test_events_are_sorted_by_offset() {
        let mut engine = engine(PlaybackContext::default());
        engine
            .load(vec![vec![
                event(0x84, Command::Finish),
                event(0x80, rest(4)),
                event(0x82, rest(6)),
            ]])
            .expect("load");
        let offsets: Vec<u64> = engine.events()[0].iter().map(|e| e.offset).collect();
        assert_eq!(vec![0x80, 0x82, 0x84], offsets);
        assert_eq!(10, engine.max_ticks());
    }

    #[test]
    fn test_notes_allocate_channels() {
        let mut engine = engine(PlaybackContext::default());
        engine.load(looping_song()).expect("load");

        // The accumulator starts empty, so the first tick lands on the third step.
        let mut buffer = vec![0i16; FRAMES_PER_TICK * 2];
        for _ in 0..3 {
            engine.step(&mut buffer).expect("step");
        }
        assert_eq!(1, engine.ticks_played());
        assert_eq!(1, engine.mixer().owned_by(0).count());
        assert_eq!(1, engine.mixer().owned_by(1).count());

        let state = engine.song_state();
        assert_eq!(120, state.tempo);
        assert_eq!(1, state.elapsed_ticks);
        assert_eq!(2, state.tracks.len());
        // Octave 4 plus key 0.
        assert_eq!(vec![48], state.tracks[0].notes);
        assert_eq!(vec![55], state.tracks[1].notes);
        assert_eq!(0x8B, state.tracks[0].position);
        assert!(state.tracks[0].left > 0.0);
        assert!(buffer.iter().any(|sample| *sample != 0));
    }

    #[test]
    fn test_missing_instrument_drops_note() {
        let mut engine = engine(PlaybackContext::default());
        engine
            .load(vec![vec![
                event(0x80, Command::Voice { id: 9 }),
                event(0x82, note(0, 10)),
                event(0x84, rest(10)),
                event(0x86, Command::Finish),
            ]])
            .expect("load");
        step_until(&mut engine, |engine| engine.ticks_played() >= 1);
        assert!(!engine.mixer().has_channels(0));
        assert_eq!(10, engine.tracks()[0].rest());
    }

    #[test]
    fn test_seek_matches_natural_play() {
        let song = looping_song();
        for target in [1, 10, 24, 25, 40, 47] {
            let mut natural = engine(PlaybackContext::default());
            natural.load(song.clone()).expect("load");
            step_until(&mut natural, |engine| engine.elapsed_ticks() == target);

            let mut seeked = engine(PlaybackContext::default());
            seeked.load(song.clone()).expect("load");
            seeked.seek(target).expect("seek");

            assert_eq!(target, seeked.elapsed_ticks());
            assert_eq!(natural.tracks(), seeked.tracks(), "tracks at {target}");
            assert_eq!(natural.tempo(), seeked.tempo());
            assert_eq!(natural.ticks_played(), seeked.ticks_played());
            assert!(seeked.mixer().channels().iter().all(|c| c.owner().is_none()));
        }
    }

    #[test]
    fn test_seek_from_anywhere_is_deterministic() {
        let mut engine = engine(PlaybackContext::default());
        engine.load(looping_song()).expect("load");
        engine.seek(30).expect("seek");
        let first = engine.tracks().to_vec();

        step_until(&mut engine, |engine| engine.elapsed_ticks() == 45);
        engine.seek(30).expect("seek");
        assert_eq!(first, engine.tracks());

        engine.seek(0).expect("seek");
        assert_eq!(0, engine.elapsed_ticks());
        engine.seek(1_000).expect("seek");
        assert_eq!(48, engine.elapsed_ticks());
    }

    #[test]
    fn test_loop_rewinds_elapsed_ticks() {
        let mut engine = engine(PlaybackContext::default());
        engine.load(looping_song()).expect("load");

        step_until(&mut engine, |engine| engine.elapsed_loops() == 1);
        // Back on the anchored note at tick 0, resting until tick 24.
        assert_eq!(0, engine.elapsed_ticks());
        assert_eq!(6, engine.tracks()[0].cursor());

        step_until(&mut engine, |engine| engine.elapsed_ticks() == 30);
        assert_eq!(1, engine.elapsed_loops());
        assert!(!engine.tracks()[0].is_stopped());
    }

    #[test]
    fn test_playlist_fades_out_and_ends() {
        let context = PlaybackContext {
            loop_threshold: 1,
            playlist_active: true,
            fade_out: Duration::from_millis(100),
        };
        let mut engine = engine(context);
        engine.load(looping_song()).expect("load");

        step_until(&mut engine, |engine| engine.elapsed_loops() == 2);
        assert!(engine.mixer().is_fading());

        let mut buffer = vec![0i16; FRAMES_PER_TICK * 2];
        let mut iterations = 0;
        while !engine.step(&mut buffer).expect("step") {
            iterations += 1;
            assert!(iterations < 1_000, "song never ended");
        }
        assert!(engine.mixer().channels().iter().all(|c| c.owner().is_none()));
    }

    #[test]
    fn test_without_playlist_loops_forever() {
        let mut engine = engine(PlaybackContext::default());
        engine.load(looping_song()).expect("load");
        let ended = step_until(&mut engine, |engine| engine.elapsed_loops() == 5);
        assert!(!ended);
        assert!(!engine.mixer().is_fading());
    }

    #[test]
    fn test_tempo_is_global() {
        let mut engine = engine(PlaybackContext::default());
        engine
            .load(vec![
                vec![
                    event(0x80, Command::Tempo { bpm: 240 }),
                    event(0x82, rest(4)),
                    event(0x84, Command::Finish),
                ],
                vec![event(0x90, rest(4)), event(0x92, Command::Finish)],
            ])
            .expect("load");
        // Tempo changes during the tick walk do not persist into playback.
        assert_eq!(120, engine.tempo());

        let mut buffer = vec![0i16; FRAMES_PER_TICK * 2];
        engine.step(&mut buffer).expect("step");
        engine.step(&mut buffer).expect("step");
        assert_eq!(0, engine.ticks_played());
        engine.step(&mut buffer).expect("step");
        assert_eq!(240, engine.tempo());
        assert_eq!(1, engine.ticks_played());
        // 240 per step now crosses the threshold every time.
        engine.step(&mut buffer).expect("step");
        assert_eq!(2, engine.ticks_played());
    }

    #[test]
    fn test_missing_loop_target_is_an_error() {
        let mut engine = engine(PlaybackContext::default());
        let result = engine.load(vec![vec![
            event(0x80, Command::LoopStart { target: 0x99 }),
            event(0x81, rest(2)),
            event(0x83, Command::Finish),
        ]]);
        assert!(matches!(
            result,
            Err(PlayerError::LoopTargetMissing {
                track: 0,
                offset: 0x99
            })
        ));
        assert!(!engine.is_loaded());
        assert!(engine.tracks().is_empty());
    }

    #[test]
    fn test_loop_without_rest_stops_track() {
        let mut engine = engine(PlaybackContext::default());
        engine
            .load(vec![
                vec![
                    event(0x80, rest(3)),
                    event(0x82, Command::LoopStart { target: 0x83 }),
                    event(0x83, Command::Volume { volume: 10 }),
                    event(0x85, Command::Finish),
                ],
                vec![event(0x90, rest(6)), event(0x92, Command::Finish)],
            ])
            .expect("load");
        assert_eq!(6, engine.max_ticks());
        let ended = step_until(&mut engine, |engine| engine.tracks()[0].is_stopped());
        assert!(!ended);
    }

    #[test]
    fn test_render_writes_until_song_end() {
        let mut engine = engine(PlaybackContext::default());
        let mut sink = CaptureSink::default();
        assert!(matches!(
            engine.render(&mut sink, None),
            Err(PlayerError::NoSong)
        ));

        engine
            .load(vec![vec![
                event(0x80, Command::Volume { volume: 0x7F }),
                event(0x82, Command::Expression { expression: 0x7F }),
                event(0x84, note(0, 4)),
                event(0x86, rest(8)),
                event(0x88, Command::Finish),
            ]])
            .expect("load");
        let frames = engine.render(&mut sink, None).expect("render");
        assert!(sink.is_finished());
        assert_eq!(frames as usize * 2, sink.samples().len());
        assert!(sink.samples().iter().any(|sample| *sample != 0));

        let mut limited = CaptureSink::default();
        engine.load(looping_song()).expect("load");
        let frames = engine.render(&mut limited, Some(100)).expect("render");
        assert_eq!(100, engine.ticks_played());
        assert!(frames >= 200 * FRAMES_PER_TICK as u64);
    }

    #[test]
    fn test_render_stops_when_tempo_is_zero() {
        let context = PlaybackContext {
            playlist_active: true,
            ..PlaybackContext::default()
        };
        let mut engine = engine(context);
        engine
            .load(vec![vec![
                event(0x80, Command::Tempo { bpm: 0 }),
                event(0x82, rest(10)),
                event(0x84, Command::Finish),
            ]])
            .expect("load");

        let mut sink = CaptureSink::default();
        let frames = engine.render(&mut sink, Some(100)).expect("render");
        assert_eq!(1, engine.ticks_played());
        assert_eq!(0, engine.tempo());
        assert_eq!(3 * FRAMES_PER_TICK as u64, frames);
        assert!(sink.is_finished());
        assert_eq!(frames as usize * 2, sink.samples().len());
    }
}
