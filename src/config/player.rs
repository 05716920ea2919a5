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
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use crate::player::PlaybackContext;

use super::error::ConfigError;

const DEFAULT_LOOPS: u64 = 2;
const DEFAULT_FADE_OUT: Duration = Duration::from_secs(10);

/// The configuration for the player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The sample bank definition, relative to this file.
    bank: String,
    /// Song files, relative to this file. Songs are loaded by index into this list.
    #[serde(default)]
    songs: Vec<String>,
    /// Loops to play before fading out when the playlist is active.
    loops: Option<u64>,
    /// How long the fade out takes.
    fade_out: Option<String>,
    /// Fade out and end songs instead of looping forever.
    playlist: Option<bool>,

    /// Directory relative paths resolve against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Player {
    /// Parse a player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        let mut player = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?;
        player.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(player)
    }

    /// The sample bank definition file.
    pub fn bank(&self) -> PathBuf {
        self.base_dir.join(&self.bank)
    }

    /// Song files in load order.
    pub fn songs(&self) -> Vec<PathBuf> {
        self.songs.iter().map(|song| self.base_dir.join(song)).collect()
    }

    /// Loops before fading out (default: 2).
    pub fn loops(&self) -> u64 {
        self.loops.unwrap_or(DEFAULT_LOOPS)
    }

    /// The fade out duration (default: 10s).
    pub fn fade_out(&self) -> Result<Duration, ConfigError> {
        match &self.fade_out {
            Some(fade_out) => Ok(DurationString::from_string(fade_out.clone())
                .map_err(|e| ConfigError::Duration(format!("{}: {}", fade_out, e)))?
                .into()),
            None => Ok(DEFAULT_FADE_OUT),
        }
    }

    /// Whether songs end after the loop threshold (default: false).
    pub fn playlist(&self) -> bool {
        self.playlist.unwrap_or(false)
    }

    /// The playback behavior this configuration describes.
    pub fn playback_context(&self) -> Result<PlaybackContext, ConfigError> {
        Ok(PlaybackContext {
            loop_threshold: self.loops(),
            playlist_active: self.playlist(),
            fade_out: self.fade_out()?,
        })
    }
}
