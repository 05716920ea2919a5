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
//! Song playback.
//!
//! [`Engine`] holds the sequencer and mixer and advances them one 192 Hz iteration at a
//! time. [`Player`] drives an engine from a dedicated thread and exposes the transport.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level, Span};

use crate::{
    bank::SampleBank,
    sequence::{self, SmdFile, SongSource},
    sink::AudioSink,
    synth::{FRAMES_PER_TICK, TICK_RATE},
};

mod engine;
mod error;
mod state;
mod thread_priority;
mod track;

pub use engine::{Engine, PlaybackContext};
pub use error::PlayerError;
pub use state::{SongState, TrackState};
pub use track::Track;

/// Transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayerState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
    ShutDown = 3,
}

impl PlayerState {
    fn from_u8(value: u8) -> PlayerState {
        match value {
            1 => PlayerState::Playing,
            2 => PlayerState::Paused,
            3 => PlayerState::ShutDown,
            _ => PlayerState::Stopped,
        }
    }
}

/// Notifications from the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The song finished, or play was requested with nothing loaded.
    SongEnded,
}

/// Shared between the player handle and the sequencer thread.
struct Shared {
    state: AtomicU8,
    engine: Mutex<Engine>,
    events: Sender<PlayerEvent>,
}

impl Shared {
    fn state(&self) -> PlayerState {
        PlayerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlayerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn song_ended(&self) {
        // The receiver lives as long as the player.
        let _ = self.events.send(PlayerEvent::SongEnded);
    }
}

/// Plays songs on a dedicated sequencer thread.
pub struct Player {
    shared: Arc<Shared>,
    events: Receiver<PlayerEvent>,
    /// Songs addressable by `load_song`.
    songs: Vec<PathBuf>,
    join: Option<thread::JoinHandle<()>>,
    span: Span,
}

impl Player {
    /// Creates a stopped player and starts its sequencer thread.
    pub fn new(
        bank: Arc<dyn SampleBank>,
        context: PlaybackContext,
        songs: Vec<PathBuf>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Player, PlayerError> {
        let (events_tx, events_rx) = unbounded();
        let shared = Arc::new(Shared {
            state: AtomicU8::new(PlayerState::Stopped as u8),
            engine: Mutex::new(Engine::new(bank, context)),
            events: events_tx,
        });
        let span = span!(Level::INFO, "player");

        let join = {
            let shared = shared.clone();
            let span = span.clone();
            thread::Builder::new()
                .name("dse-tick".into())
                .spawn(move || {
                    let _enter = span.enter();
                    Player::run(shared, sink)
                })
                .map_err(|e| PlayerError::Thread(e.to_string()))?
        };

        Ok(Player {
            shared,
            events: events_rx,
            songs,
            join: Some(join),
            span,
        })
    }

    /// The sequencer loop. Renders one block per period while playing.
    fn run(shared: Arc<Shared>, mut sink: Box<dyn AudioSink>) {
        thread_priority::configure_tick_thread_priority(
            thread_priority::tick_thread_priority(),
            thread_priority::rt_enabled(),
        );

        let period = Duration::from_secs(1) / TICK_RATE;
        let mut buffer = vec![0i16; FRAMES_PER_TICK * 2];
        let mut deadline = Instant::now();
        info!("Sequencer thread started");

        loop {
            match shared.state() {
                PlayerState::ShutDown => break,
                PlayerState::Playing => {
                    let mut engine = shared.engine.lock();
                    // Transport calls may have changed state while we waited on the lock.
                    if shared.state() == PlayerState::Playing {
                        match engine.step(&mut buffer) {
                            Ok(ended) => {
                                if let Err(e) = sink.write(&buffer) {
                                    error!(err = %e, "Output failed, stopping song");
                                    shared.set_state(PlayerState::Stopped);
                                    engine.stop_all_channels();
                                    shared.song_ended();
                                } else if ended {
                                    shared.set_state(PlayerState::Stopped);
                                    shared.song_ended();
                                }
                            }
                            Err(e) => {
                                error!(err = %e, "Sequencer failed, stopping song");
                                shared.set_state(PlayerState::Stopped);
                                engine.stop_all_channels();
                            }
                        }
                    }
                }
                PlayerState::Stopped | PlayerState::Paused => {}
            }

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                spin_sleep::sleep(deadline - now);
            } else if now - deadline > period {
                debug!(behind = ?(now - deadline), "Sequencer fell behind, resetting deadline");
                deadline = now;
            }
        }

        if let Err(e) = sink.finish() {
            error!(err = %e, "Unable to finish output");
        }
        info!("Sequencer thread stopped");
    }

    /// Loads the song at `index` in the configured song list. Playback stops first.
    pub fn load_song(&self, index: usize) -> Result<(), PlayerError> {
        let path = self.songs.get(index).ok_or(PlayerError::SongIndex(index))?;
        let file = SmdFile::open(path)?;
        self.load(&file)?;
        info!(song = index, path = ?path, "Loaded song file");
        Ok(())
    }

    /// Loads a song from any source. On error the previous song is gone and nothing is
    /// loaded.
    pub fn load(&self, source: &dyn SongSource) -> Result<(), PlayerError> {
        let _enter = self.span.enter();
        self.stop();

        let parsed = sequence::parse_song(source);
        let mut engine = self.shared.engine.lock();
        match parsed {
            Ok(events) => engine.load(events),
            Err(e) => {
                engine.unload();
                Err(e.into())
            }
        }
    }

    /// Starts the loaded song from the beginning.
    pub fn play(&self) {
        let _enter = self.span.enter();
        let mut engine = self.shared.engine.lock();
        if self.state() == PlayerState::ShutDown {
            return;
        }
        if !engine.is_loaded() {
            info!("Nothing to play");
            self.shared.song_ended();
            return;
        }

        if matches!(self.state(), PlayerState::Playing | PlayerState::Paused) {
            engine.stop_all_channels();
        }
        engine.init_emulation();
        self.shared.set_state(PlayerState::Playing);
        info!("Playing");
    }

    /// Toggles between playing and paused. Pausing a stopped player resumes it from
    /// wherever the sequencer was left.
    pub fn pause(&self) {
        let _enter = self.span.enter();
        let _engine = self.shared.engine.lock();
        match self.state() {
            PlayerState::Playing => {
                self.shared.set_state(PlayerState::Paused);
                info!("Paused");
            }
            PlayerState::Paused | PlayerState::Stopped => {
                self.shared.set_state(PlayerState::Playing);
                info!("Resumed");
            }
            PlayerState::ShutDown => {}
        }
    }

    /// Stops playback and silences every channel.
    pub fn stop(&self) {
        let _enter = self.span.enter();
        let mut engine = self.shared.engine.lock();
        if matches!(self.state(), PlayerState::Playing | PlayerState::Paused) {
            self.shared.set_state(PlayerState::Stopped);
            engine.stop_all_channels();
            info!("Stopped");
        }
    }

    /// Moves playback to `ticks` by replaying the song silently from the start. The
    /// player pauses around the seek, so a playing or paused song ends up playing.
    pub fn set_current_position(&self, ticks: u64) -> Result<(), PlayerError> {
        let _enter = self.span.enter();
        if !self.shared.engine.lock().is_loaded() {
            self.shared.song_ended();
            return Ok(());
        }
        if self.state() == PlayerState::ShutDown {
            return Ok(());
        }

        if self.state() == PlayerState::Playing {
            self.pause();
        }
        let result = self.shared.engine.lock().seek(ticks);
        if let Err(e) = result {
            self.shared.set_state(PlayerState::Stopped);
            return Err(e);
        }
        self.pause();
        info!(ticks, "Seeked");
        Ok(())
    }

    pub fn state(&self) -> PlayerState {
        self.shared.state()
    }

    /// Receives player notifications.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events.clone()
    }

    /// A snapshot for display, if a song is loaded.
    pub fn song_state(&self) -> Option<SongState> {
        let engine = self.shared.engine.lock();
        engine.is_loaded().then(|| engine.song_state())
    }

    pub fn set_mute(&self, track: usize, muted: bool) {
        self.shared.engine.lock().set_mute(track, muted);
    }

    pub fn max_ticks(&self) -> u64 {
        self.shared.engine.lock().max_ticks()
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.shared.engine.lock().elapsed_ticks()
    }

    /// Stops playback and joins the sequencer thread. Later transport calls do nothing.
    pub fn shutdown(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.stop();
        self.shared.set_state(PlayerState::ShutDown);
        if join.join().is_err() {
            error!("Sequencer thread panicked");
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}
