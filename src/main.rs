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
use std::{error::Error, path::PathBuf, sync::Arc};

use clap::{crate_version, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use dseplay::{
    bank::MemoryBank,
    config,
    player::{Engine, PlaybackContext, Player, PlayerError, PlayerEvent},
    sequence::{self, SmdFile},
    sink::{CpalSink, WavSink},
    synth::{FRAMES_PER_TICK, SAMPLE_RATE},
};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A DSE sequenced music player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints every event of an SMD file along with the ticks it plays at.
    Events {
        /// The SMD file.
        path: PathBuf,
    },
    /// Prints a summary of an SMD file as YAML.
    Info {
        /// The SMD file.
        path: PathBuf,
    },
    /// Plays a song through the default audio device.
    Play {
        /// The path to the player config.
        config_path: PathBuf,
        /// The index of the song in the config's song list.
        index: usize,
        /// Start playback at this tick.
        #[arg[short, long]]
        from: Option<u64>,
    },
    /// Renders a song to a WAV file. Songs fade out after the configured loop count.
    Render {
        /// The path to the player config.
        config_path: PathBuf,
        /// The index of the song in the config's song list.
        index: usize,
        /// The WAV file to write.
        output: PathBuf,
        /// Stop after this many ticks.
        #[arg[short, long]]
        max_ticks: Option<u64>,
    },
}

/// What `info` reports.
#[derive(Serialize)]
struct SongSummary {
    label: String,
    version: String,
    created: String,
    tracks: u8,
    channels: u8,
    master_volume: Option<i8>,
    master_panpot: Option<i8>,
    max_ticks: u64,
    longest_track: usize,
}

/// Parses a song and runs the tick walk without any instruments.
fn simulate(file: &SmdFile) -> Result<Engine, PlayerError> {
    let mut engine = Engine::new(Arc::new(MemoryBank::new()), PlaybackContext::default());
    engine.load(sequence::parse_song(file)?)?;
    Ok(engine)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Events { path } => {
            let file = SmdFile::open(&path)?;
            let engine = simulate(&file)?;
            println!("{}", file.header());
            for (index, events) in engine.events().iter().enumerate() {
                println!("Track {} ({} events):", index, events.len());
                for event in events {
                    println!("  {}", event);
                }
            }
        }
        Commands::Info { path } => {
            let file = SmdFile::open(&path)?;
            let engine = simulate(&file)?;
            let header = file.header();
            let song = file.song();
            let summary = SongSummary {
                label: header.label.clone(),
                version: format!("0x{:X}", header.version),
                created: format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    header.year, header.month, header.day, header.hour, header.minute, header.second
                ),
                tracks: song.track_count,
                channels: song.channel_count,
                master_volume: song.master_volume,
                master_panpot: song.master_panpot,
                max_ticks: engine.max_ticks(),
                longest_track: engine.longest_track(),
            };
            print!("{}", serde_yml::to_string(&summary)?);
        }
        Commands::Play {
            config_path,
            index,
            from,
        } => {
            let (player_config, bank) = config::load(&config_path)?;
            let sink = CpalSink::open_default()?;
            println!("Playing through {}", sink.device_name());

            let player = Player::new(
                bank,
                player_config.playback_context()?,
                player_config.songs(),
                Box::new(sink),
            )?;
            let events = player.events();
            player.load_song(index)?;
            match from {
                Some(ticks) => player.set_current_position(ticks)?,
                None => player.play(),
            }

            while let Ok(event) = events.recv() {
                match event {
                    PlayerEvent::SongEnded => {
                        println!("Song ended");
                        break;
                    }
                }
            }
        }
        Commands::Render {
            config_path,
            index,
            output,
            max_ticks,
        } => {
            let (player_config, bank) = config::load(&config_path)?;
            let path = player_config
                .songs()
                .get(index)
                .cloned()
                .ok_or(PlayerError::SongIndex(index))?;

            let mut context = player_config.playback_context()?;
            context.playlist_active = true;
            let mut engine = Engine::new(bank, context);
            engine.load(sequence::parse_song(&SmdFile::open(&path)?)?)?;

            let mut sink = WavSink::create(&output)?;
            let frames = engine.render(&mut sink, max_ticks)?;
            println!(
                "Wrote {} frames ({:.1}s, {} iterations of {} frames at {} Hz) to {}",
                frames,
                frames as f64 / f64::from(SAMPLE_RATE),
                frames / FRAMES_PER_TICK as u64,
                FRAMES_PER_TICK,
                SAMPLE_RATE,
                output.display()
            );
        }
    }

    Ok(())
}
