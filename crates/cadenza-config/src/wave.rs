//! Wave table and sample definitions.

use serde::{Deserialize, Serialize};

use cadenza_synth::{MultiWaveTable, Sample, WaveLibrary, WaveTable};

use crate::error::ConfigError;

fn default_frame_len() -> usize {
    256
}

/// One single-cycle frame, given directly or as harmonic amplitudes.
///
/// ```toml
/// frames = [
///     { samples = [0.0, 1.0, 0.0, -1.0] },
///     { harmonics = [1.0, 0.5, 0.33], length = 512 },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameDef {
    /// Literal sample values.
    Samples {
        /// One cycle of the waveform.
        samples: Vec<f32>,
    },
    /// Sum of sine harmonics, normalized to unit peak.
    Harmonics {
        /// Amplitude of harmonic 1, 2, 3, ...
        harmonics: Vec<f64>,
        /// Frame length in samples.
        #[serde(default = "default_frame_len")]
        length: usize,
    },
}

impl FrameDef {
    fn render(&self) -> Vec<f32> {
        match self {
            FrameDef::Samples { samples } => samples.clone(),
            FrameDef::Harmonics { harmonics, length } => additive_frame(harmonics, *length),
        }
    }
}

fn additive_frame(harmonics: &[f64], length: usize) -> Vec<f32> {
    let mut frame: Vec<f64> = (0..length)
        .map(|i| {
            let phase = core::f64::consts::TAU * i as f64 / length as f64;
            harmonics
                .iter()
                .enumerate()
                .map(|(k, amp)| amp * libm::sin(phase * (k + 1) as f64))
                .sum()
        })
        .collect();
    let peak = frame.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if peak > 0.0 {
        for x in &mut frame {
            *x /= peak;
        }
    }
    frame.into_iter().map(|x| x as f32).collect()
}

/// Frames used up to `max_hz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveRange {
    /// Highest pitch served by this range; omitted means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hz: Option<f64>,
    /// Frames blended by the oscillator index.
    pub frames: Vec<FrameDef>,
}

/// A named multi-range wave table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveTableDef {
    /// Library name.
    pub name: String,
    /// Pitch ranges, in any order.
    pub ranges: Vec<WaveRange>,
}

impl WaveTableDef {
    /// A single-range table holding one frame.
    pub fn single(name: impl Into<String>, frame: FrameDef) -> Self {
        Self {
            name: name.into(),
            ranges: vec![WaveRange {
                max_hz: None,
                frames: vec![frame],
            }],
        }
    }

    /// Renders every range.
    pub fn build(&self) -> Result<MultiWaveTable, ConfigError> {
        if self.ranges.is_empty() {
            return Err(ConfigError::wave_table(&self.name, "no ranges"));
        }
        let mut table = MultiWaveTable::new();
        for range in &self.ranges {
            if range.frames.is_empty() {
                return Err(ConfigError::wave_table(&self.name, "range has no frames"));
            }
            let max_hz = range.max_hz.unwrap_or(f64::INFINITY);
            if max_hz.is_nan() || max_hz <= 0.0 {
                return Err(ConfigError::wave_table(
                    &self.name,
                    format!("range limit must be positive, got {max_hz}"),
                ));
            }
            let frames = range.frames.iter().map(FrameDef::render).collect();
            table.add(max_hz, WaveTable::new(frames)?);
        }
        Ok(table)
    }
}

/// A named recorded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDef {
    /// Library name.
    pub name: String,
    /// Sample data.
    pub data: Vec<f32>,
    /// Rate the data was recorded at.
    pub sample_rate: f64,
    /// Pitch the data sounds at when played at its own rate.
    pub root_hz: f64,
    /// First looped sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_start: Option<usize>,
    /// One past the last looped sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_end: Option<usize>,
}

impl SampleDef {
    /// Checks the loop and builds the sample.
    pub fn build(&self) -> Result<Sample, ConfigError> {
        let loop_range = match (self.loop_start, self.loop_end) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            _ => return Err(ConfigError::sample(&self.name, "loop needs both start and end")),
        };
        Ok(Sample::new(
            self.data.clone(),
            self.sample_rate,
            self.root_hz,
            loop_range,
        )?)
    }
}

/// Builds a library from wave table and sample definitions.
///
/// A later definition replaces an earlier one of the same name.
pub fn build_library(
    wave_tables: &[WaveTableDef],
    samples: &[SampleDef],
) -> Result<WaveLibrary, ConfigError> {
    let mut library = WaveLibrary::new();
    for def in wave_tables {
        library.insert_wave_table(&def.name, def.build()?);
    }
    for def in samples {
        library.insert_sample(&def.name, def.build()?);
    }
    Ok(library)
}
