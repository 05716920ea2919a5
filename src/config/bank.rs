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
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use config::{Config, File};
use serde::Deserialize;
use tracing::{debug, info};

use crate::bank::{Envelope, MemoryBank, SampleData, SampleFormat, SampleRef, Split};

use super::error::ConfigError;

/// A YAML sample bank definition.
#[derive(Deserialize, Clone, Debug)]
pub struct Bank {
    samples: Vec<Sample>,
    programs: Vec<Program>,

    /// Directory sample files resolve against.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// One sample. WAV files carry their own format and rate; any other file is read as raw
/// bytes and needs both.
#[derive(Deserialize, Clone, Debug)]
pub struct Sample {
    id: u32,
    file: String,
    format: Option<SampleFormat>,
    sample_rate: Option<u32>,
    /// Loop start in 32-bit words of sample data.
    #[serde(default)]
    loop_start: u32,
    #[serde(default)]
    looped: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Program {
    voice: u8,
    splits: Vec<SplitDefinition>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SplitDefinition {
    #[serde(default)]
    low_key: u8,
    #[serde(default = "default_high_key")]
    high_key: u8,
    root_key: u8,
    sample: u32,
    envelope: Envelope,
}

fn default_high_key() -> u8 {
    127
}

impl Bank {
    /// Parse a bank definition from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Bank, ConfigError> {
        let mut bank = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Bank>()?;
        bank.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(bank)
    }

    /// Reads every sample and builds the bank.
    pub fn load(&self) -> Result<MemoryBank, ConfigError> {
        let mut bank = MemoryBank::new();
        let mut refs: HashMap<u32, SampleRef> = HashMap::new();

        for sample in &self.samples {
            let data = sample.read(&self.base_dir)?;
            debug!(
                id = sample.id,
                format = %data.format,
                bytes = data.data.len(),
                sample_rate = data.sample_rate,
                "Loaded sample"
            );
            if refs.insert(sample.id, bank.add_sample(data)).is_some() {
                return Err(ConfigError::Sample(format!(
                    "sample id {} is defined twice",
                    sample.id
                )));
            }
        }

        for program in &self.programs {
            for split in &program.splits {
                let sample = refs.get(&split.sample).copied().ok_or_else(|| {
                    ConfigError::Sample(format!(
                        "voice {} refers to unknown sample {}",
                        program.voice, split.sample
                    ))
                })?;
                bank.add_split(
                    program.voice,
                    Split {
                        low_key: split.low_key,
                        high_key: split.high_key,
                        root_key: split.root_key,
                        sample,
                        envelope: split.envelope,
                    },
                );
            }
        }

        info!(
            programs = bank.program_count(),
            samples = bank.sample_count(),
            "Loaded sample bank"
        );
        Ok(bank)
    }
}

impl Sample {
    fn read(&self, base_dir: &Path) -> Result<SampleData, ConfigError> {
        let path = base_dir.join(&self.file);
        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

        let (format, data, sample_rate) = if is_wav {
            read_wav(&path)?
        } else {
            let format = self.format.ok_or_else(|| {
                ConfigError::Sample(format!("{} needs a format", self.file))
            })?;
            let sample_rate = self.sample_rate.ok_or_else(|| {
                ConfigError::Sample(format!("{} needs a sample_rate", self.file))
            })?;
            (format, fs::read(&path)?, sample_rate)
        };

        Ok(SampleData {
            format,
            data,
            loop_start: self.loop_start,
            looped: self.looped,
            sample_rate: self.sample_rate.unwrap_or(sample_rate),
        })
    }
}

/// Decodes an 8 or 16-bit integer WAV into raw PCM bytes. Only the first channel is kept.
fn read_wav(path: &Path) -> Result<(SampleFormat, Vec<u8>, u32), ConfigError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(ConfigError::Sample(format!(
            "{} is not integer PCM",
            path.display()
        )));
    }
    let channels = usize::from(spec.channels.max(1));

    let (format, data) = match spec.bits_per_sample {
        8 => {
            let mut data = Vec::new();
            for sample in reader.samples::<i8>().step_by(channels) {
                data.push(sample? as u8);
            }
            (SampleFormat::Pcm8, data)
        }
        16 => {
            let mut data = Vec::new();
            for sample in reader.samples::<i16>().step_by(channels) {
                data.extend_from_slice(&sample?.to_le_bytes());
            }
            (SampleFormat::Pcm16, data)
        }
        bits => {
            return Err(ConfigError::Sample(format!(
                "{} has unsupported bit depth {}",
                path.display(),
                bits
            )))
        }
    };
    Ok((format, data, spec.sample_rate))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::bank::SampleBank;

    use super::*;

    fn write_wav(path: &Path, bits: u16, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 32728,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create");
        for sample in samples {
            if bits == 8 {
                writer.write_sample(*sample as i8).expect("write");
            } else {
                writer.write_sample(*sample).expect("write");
            }
        }
        writer.finalize().expect("finalize");
    }

    #[test]
    fn test_load_bank() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_wav(&dir.path().join("lead.wav"), 16, 2, &[100, 1, -200, 2, 300, 3]);
        write_wav(&dir.path().join("bass.wav"), 8, 1, &[-1, 2, -3]);
        fs::write(dir.path().join("pad.raw"), [0x10, 0x00, 0x00, 0x00, 0x12, 0x34]).expect("raw");

        let path = dir.path().join("bank.yaml");
        fs::write(
            &path,
            r#"
            samples:
              - id: 10
                file: lead.wav
                looped: true
                loop_start: 1
              - id: 11
                file: bass.wav
              - id: 12
                file: pad.raw
                format: adpcm
                sample_rate: 16364
            programs:
              - voice: 0
                splits:
                  - high_key: 59
                    root_key: 48
                    sample: 11
                    envelope: { attack: 127, decay: 127, sustain: 127, release: 40 }
                  - low_key: 60
                    root_key: 72
                    sample: 10
                    envelope: { attack: 127, decay: 100, sustain: 90, release: 40 }
              - voice: 5
                splits:
                  - root_key: 60
                    sample: 12
                    envelope: { attack: 0, decay: 0, sustain: 0, release: 0 }
            "#,
        )
        .expect("write");

        let bank: Arc<dyn SampleBank> =
            Arc::new(Bank::deserialize(&path).expect("parse").load().expect("load"));

        let lead = bank.lookup_instrument(0, 64).expect("lead");
        assert_eq!(72, lead.root_key);
        assert_eq!(512, lead.base_timer);
        let data = bank.sample_data(lead.sample).expect("lead data");
        assert_eq!(SampleFormat::Pcm16, data.format);
        assert_eq!(vec![100, 0, 0x38, 0xFF, 0x2C, 0x01], data.data);
        assert!(data.looped);
        assert_eq!(4, data.loop_offset());

        let bass = bank.lookup_instrument(0, 30).expect("bass");
        let data = bank.sample_data(bass.sample).expect("bass data");
        assert_eq!(SampleFormat::Pcm8, data.format);
        assert_eq!(vec![0xFF, 0x02, 0xFD], data.data);
        assert!(!data.looped);

        let pad = bank.lookup_instrument(5, 0).expect("pad");
        assert_eq!(1024, pad.base_timer);
        let data = bank.sample_data(pad.sample).expect("pad data");
        assert_eq!(SampleFormat::Adpcm, data.format);
        assert_eq!(6, data.data.len());

        assert!(bank.lookup_instrument(1, 60).is_none());
    }

    #[test]
    fn test_raw_sample_needs_format_and_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("pad.raw"), [0u8; 8]).expect("raw");
        let path = dir.path().join("bank.yaml");
        fs::write(
            &path,
            r#"
            samples:
              - id: 0
                file: pad.raw
                format: pcm8
            programs: []
            "#,
        )
        .expect("write");

        let result = Bank::deserialize(&path).expect("parse").load();
        assert!(matches!(result, Err(ConfigError::Sample(_))));
    }

    #[test]
    fn test_unknown_sample_reference() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bank.yaml");
        fs::write(
            &path,
            r#"
            samples: []
            programs:
              - voice: 0
                splits:
                  - root_key: 60
                    sample: 3
                    envelope: { attack: 0, decay: 0, sustain: 0, release: 0 }
            "#,
        )
        .expect("write");

        let result = Bank::deserialize(&path).expect("parse").load();
        assert!(matches!(result, Err(ConfigError::Sample(_))));
    }

    #[test]
    fn test_missing_sample_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bank.yaml");
        fs::write(
            &path,
            r#"
            samples:
              - id: 0
                file: gone.wav
            programs: []
            "#,
        )
        .expect("write");

        let result = Bank::deserialize(&path).expect("parse").load();
        assert!(matches!(result, Err(ConfigError::Wav(_))));
    }
}
