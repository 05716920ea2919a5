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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SizedSample,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{error, info, warn};

use crate::synth::SAMPLE_RATE;

use super::{AudioSink, SinkError};

/// Blocks queued between the sequencer and the device callback.
const QUEUE_BLOCKS: usize = 16;

/// Capacity of the return path for played blocks. Larger than the number of blocks that can
/// be in flight, so the callback never has to drop one.
const SPENT_BLOCKS: usize = QUEUE_BLOCKS * 2;

/// How long `finish` waits for queued audio to play out.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Plays blocks through the default output device. The stream lives on its own thread,
/// since cpal streams cannot move between threads.
pub struct CpalSink {
    device_name: String,
    channels: usize,
    device_rate: u32,
    /// Resampling phase, in units of the engine rate.
    phase: u64,
    blocks: Sender<Vec<f32>>,
    /// Played blocks handed back by the callback for reuse.
    spent: Receiver<Vec<f32>>,
    /// A converted block the full queue turned away.
    held: Option<Vec<f32>>,
    stop: Arc<AtomicBool>,
    output_thread: Option<thread::JoinHandle<()>>,
    dropped: u64,
}

impl CpalSink {
    /// Opens the default output device with its default configuration.
    pub fn open_default() -> Result<CpalSink, SinkError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SinkError::NoDevice)?;
        let config = device.default_output_config()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let sample_format = config.sample_format();
        let channels = usize::from(config.channels());
        let device_rate = config.sample_rate();
        let stream_config: cpal::StreamConfig = config.into();

        let (blocks_tx, blocks_rx) = bounded::<Vec<f32>>(QUEUE_BLOCKS);
        let (spent_tx, spent_rx) = bounded::<Vec<f32>>(SPENT_BLOCKS);
        let (ready_tx, ready_rx) = bounded::<Result<(), SinkError>>(1);
        let stop = Arc::new(AtomicBool::new(false));

        let output_thread = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("dse-output".into())
                .spawn(move || {
                    let stream = match sample_format {
                        cpal::SampleFormat::F32 => {
                            build_stream::<f32>(&device, &stream_config, blocks_rx, spent_tx)
                        }
                        cpal::SampleFormat::I16 => {
                            build_stream::<i16>(&device, &stream_config, blocks_rx, spent_tx)
                        }
                        cpal::SampleFormat::I32 => {
                            build_stream::<i32>(&device, &stream_config, blocks_rx, spent_tx)
                        }
                        cpal::SampleFormat::U16 => {
                            build_stream::<u16>(&device, &stream_config, blocks_rx, spent_tx)
                        }
                        other => Err(SinkError::UnsupportedFormat(format!("{:?}", other))),
                    };
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));

                    // Keep the stream alive until the sink is dropped.
                    while !stop.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(50));
                    }
                })
                .map_err(|_| SinkError::Closed)?
        };

        // The thread always reports before exiting.
        ready_rx.recv().map_err(|_| SinkError::Closed)??;
        info!(
            device = device_name,
            channels,
            sample_rate = device_rate,
            "Output stream started"
        );

        Ok(CpalSink {
            device_name,
            channels,
            device_rate,
            phase: 0,
            blocks: blocks_tx,
            spent: spent_rx,
            held: None,
            stop,
            output_thread: Some(output_thread),
            dropped: 0,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    blocks: Receiver<Vec<f32>>,
    spent: Sender<Vec<f32>>,
) -> Result<cpal::Stream, SinkError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut pending: Vec<f32> = Vec::new();
    let mut position = 0;
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for sample in data.iter_mut() {
                if position >= pending.len() {
                    match blocks.try_recv() {
                        Ok(block) => {
                            // Hand the played block back rather than freeing it here.
                            let _ = spent.try_send(std::mem::replace(&mut pending, block));
                            position = 0;
                        }
                        Err(_) => {
                            *sample = T::EQUILIBRIUM;
                            continue;
                        }
                    }
                }
                *sample = T::from_sample(pending[position]);
                position += 1;
            }
        },
        |err| error!("Output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Converts engine-rate stereo frames into device-rate frames with `channels` channels,
/// holding each source frame for as many device frames as its share of time covers.
/// Channels past the first two are silent; a mono device gets the average. `out` is
/// cleared first and keeps its capacity.
fn convert_block(
    block: &[i16],
    channels: usize,
    device_rate: u32,
    phase: &mut u64,
    out: &mut Vec<f32>,
) {
    out.clear();
    for frame in block.chunks_exact(2) {
        let left = f32::from(frame[0]) / 32768.0;
        let right = f32::from(frame[1]) / 32768.0;
        *phase += u64::from(device_rate);
        while *phase >= u64::from(SAMPLE_RATE) {
            *phase -= u64::from(SAMPLE_RATE);
            if channels == 1 {
                out.push((left + right) / 2.0);
                continue;
            }
            out.push(left);
            out.push(right);
            out.extend(std::iter::repeat(0.0).take(channels.saturating_sub(2)));
        }
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, block: &[i16]) -> Result<(), SinkError> {
        let mut converted = self
            .held
            .take()
            .or_else(|| self.spent.try_recv().ok())
            .unwrap_or_default();
        convert_block(
            block,
            self.channels,
            self.device_rate,
            &mut self.phase,
            &mut converted,
        );
        match self.blocks.try_send(converted) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(converted)) => {
                self.held = Some(converted);
                self.dropped += 1;
                warn!(dropped = self.dropped, "Output queue full, dropping block");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Closed),
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let start = Instant::now();
        while !self.blocks.is_empty() && start.elapsed() < DRAIN_TIMEOUT {
            thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(output_thread) = self.output_thread.take() {
            if output_thread.join().is_err() {
                error!("Output thread panicked");
            }
        }
    }
}
