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
use std::{path::Path, sync::Arc};

use crate::bank::SampleBank;

mod bank;
mod error;
mod player;

pub use bank::Bank;
pub use error::ConfigError;
pub use player::Player;

/// Loads a player configuration and the sample bank it names.
pub fn load(path: &Path) -> Result<(Player, Arc<dyn SampleBank>), ConfigError> {
    let player = Player::deserialize(path)?;
    let bank = Bank::deserialize(&player.bank())?.load()?;
    Ok((player, Arc::new(bank)))
}
