//! Wave tables, samples, and the named library oscillators resolve against.

#[cfg(not(feature = "std"))]
use alloc::{
    collections::BTreeMap,
    format,
    string::{String, ToString},
    sync::Arc,
    vec,
    vec::Vec,
};
#[cfg(feature = "std")]
use std::{collections::BTreeMap, sync::Arc};

use cadenza_core::Fixed64;

use crate::error::{Result, SynthError};

/// A stack of equal-length single-cycle frames.
///
/// An index in `[0, 1]` selects a position across the stack; positions
/// between frames crossfade the two neighbors.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveTable {
    frames: Vec<Vec<f32>>,
    frame_len: usize,
}

impl WaveTable {
    /// Builds a table; every frame must have the same non-zero length.
    pub fn new(frames: Vec<Vec<f32>>) -> Result<Self> {
        let frame_len = frames.first().map_or(0, Vec::len);
        if frame_len == 0 {
            return Err(SynthError::invalid_template("wave table needs at least one non-empty frame"));
        }
        if let Some(bad) = frames.iter().position(|f| f.len() != frame_len) {
            return Err(SynthError::invalid_template(format!(
                "wave table frame {bad} has {} samples, expected {frame_len}",
                frames[bad].len()
            )));
        }
        if u32::try_from(frame_len).is_err() {
            return Err(SynthError::invalid_template("wave table frame too long"));
        }
        Ok(Self { frames, frame_len })
    }

    /// A one-frame table.
    pub fn single(frame: Vec<f32>) -> Result<Self> {
        Self::new(vec![frame])
    }

    /// Samples per frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// One frame.
    pub fn frame(&self, index: usize) -> &[f32] {
        &self.frames[index]
    }

    /// Splits an index in `[0, 1]` into a frame and a crossfade weight
    /// toward the next frame.
    pub fn blend(&self, index: f64) -> (usize, f32) {
        let last = self.frames.len() - 1;
        if last == 0 {
            return (0, 0.0);
        }
        let position = index.clamp(0.0, 1.0) * last as f64;
        let frame = (position as usize).min(last - 1);
        (frame, (position - frame as f64) as f32)
    }

    /// Linearly interpolated sample of `frame` at `phase` (frame samples,
    /// wrapping).
    #[inline]
    pub fn sample(&self, frame: usize, phase: Fixed64) -> f32 {
        let data = &self.frames[frame];
        let i = phase.int_part() as usize % self.frame_len;
        let j = (i + 1) % self.frame_len;
        let t = phase.frac_f64() as f32;
        data[i] + (data[j] - data[i]) * t
    }

    /// Sample at `phase` with a crossfade of `weight` from `frame` into the
    /// next frame.
    #[inline]
    pub fn sample_blended(&self, frame: usize, weight: f32, phase: Fixed64) -> f32 {
        let a = self.sample(frame, phase);
        if weight == 0.0 || frame + 1 >= self.frames.len() {
            return a;
        }
        let b = self.sample(frame + 1, phase);
        a + (b - a) * weight
    }
}

/// Pitch-ranged set of wave tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiWaveTable {
    ranges: Vec<(f64, Arc<WaveTable>)>,
}

impl MultiWaveTable {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// One table covering every pitch.
    pub fn single(table: WaveTable) -> Self {
        let mut set = Self::new();
        set.add(f64::INFINITY, table);
        set
    }

    /// Adds a table used for pitches up to `max_hz`.
    pub fn add(&mut self, max_hz: f64, table: WaveTable) {
        let at = self.ranges.partition_point(|(m, _)| *m <= max_hz);
        self.ranges.insert(at, (max_hz, Arc::new(table)));
    }

    /// Table for `pitch_hz`, or `None` above every range.
    pub fn select(&self, pitch_hz: f64) -> Option<&Arc<WaveTable>> {
        self.ranges
            .iter()
            .find(|(max_hz, _)| pitch_hz <= *max_hz)
            .map(|(_, t)| t)
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True when no table has been added.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// A recorded mono sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Sample data.
    pub data: Vec<f32>,
    /// Rate the data was recorded at.
    pub sample_rate: f64,
    /// Pitch the data sounds at when played at its own rate.
    pub root_hz: f64,
    /// Loop start and end (exclusive) held until release.
    pub loop_range: Option<(usize, usize)>,
}

impl Sample {
    /// Checks the loop range against the data.
    pub fn new(
        data: Vec<f32>,
        sample_rate: f64,
        root_hz: f64,
        loop_range: Option<(usize, usize)>,
    ) -> Result<Self> {
        if let Some((start, end)) = loop_range {
            if start >= end || end > data.len() {
                return Err(SynthError::invalid_template(format!(
                    "sample loop {start}..{end} outside {} samples",
                    data.len()
                )));
            }
        }
        if sample_rate <= 0.0 || root_hz <= 0.0 {
            return Err(SynthError::invalid_template("sample rate and root pitch must be positive"));
        }
        Ok(Self {
            data,
            sample_rate,
            root_hz,
            loop_range,
        })
    }
}

/// Named wave tables and samples.
///
/// Doubles as the dictionary of known names for
/// [`check_unreferenced_things`](crate::validate::check_unreferenced_things).
#[derive(Debug, Clone, Default)]
pub struct WaveLibrary {
    wave_tables: BTreeMap<String, Arc<MultiWaveTable>>,
    samples: BTreeMap<String, Arc<Sample>>,
}

impl WaveLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a wave table set.
    pub fn insert_wave_table(&mut self, name: &str, table: MultiWaveTable) {
        self.wave_tables.insert(name.to_string(), Arc::new(table));
    }

    /// Adds or replaces a sample.
    pub fn insert_sample(&mut self, name: &str, sample: Sample) {
        self.samples.insert(name.to_string(), Arc::new(sample));
    }

    /// Looks up a wave table set.
    pub fn wave_table(&self, name: &str) -> Result<&Arc<MultiWaveTable>> {
        self.wave_tables
            .get(name)
            .ok_or_else(|| SynthError::UndefinedWaveTable(name.to_string()))
    }

    /// Looks up a sample.
    pub fn sample(&self, name: &str) -> Result<&Arc<Sample>> {
        self.samples
            .get(name)
            .ok_or_else(|| SynthError::UndefinedSample(name.to_string()))
    }

    /// Whether a wave table of that name exists.
    pub fn has_wave_table(&self, name: &str) -> bool {
        self.wave_tables.contains_key(name)
    }

    /// Whether a sample of that name exists.
    pub fn has_sample(&self, name: &str) -> bool {
        self.samples.contains_key(name)
    }

    /// Wave table names in order.
    pub fn wave_table_names(&self) -> impl Iterator<Item = &str> {
        self.wave_tables.keys().map(String::as_str)
    }

    /// Sample names in order.
    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }
}
