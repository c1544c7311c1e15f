//! Track-level scalar parameters interpolated at the envelope tick rate.
//!
//! The sequencer drives a track through score commands such as
//! `sweepto volume 0.5 100`. Each command names a [`TrackParam`] and a
//! [`ParamOp`]; [`IncrParamUpdater`] holds the current value of every
//! parameter and steps active sweeps once per tick.
//!
//! ## Commands
//!
//! ```text
//! set     <param> <value>
//! adjust  <param> <delta>
//! scale   <param> <factor>
//! sweepto <param> <target> <ticks>
//! sweepby <param> <delta>  <ticks>
//! ```
//!
//! ```rust
//! use cadenza_synth::params::{Command, IncrParamUpdater, TrackParam};
//!
//! let mut track = IncrParamUpdater::new();
//! track.apply(&Command::parse("sweepto volume 0.5 4").unwrap());
//! track.update(2);
//! assert_eq!(track.value(TrackParam::Volume), 0.75);
//! ```

#[cfg(not(feature = "std"))]
use alloc::format;

use cadenza_core::LinearTransition;
use core::fmt;

use crate::accent::{AccentVec, NUM_ACCENTS};
use crate::error::{Result, SynthError};

/// A track scalar addressable by commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrackParam {
    /// Overall loudness multiplier.
    Volume,
    /// Stereo position in `[-1, 1]`.
    StereoPosition,
    /// Note accent offset (0..8).
    Accent(u8),
    /// Envelope speed multiplier.
    HurryUp,
    /// Pitch offset in half steps.
    Detune,
    /// Start-time offset in seconds.
    EarlyLate,
    /// Note duration multiplier.
    DurationAdjust,
    /// Whole-step transposition in half steps.
    Transpose,
    /// Pitch LFO depth multiplier.
    PitchDisplacementDepth,
    /// Pitch LFO rate multiplier.
    PitchDisplacementRate,
    /// Track effect accent (0..8).
    EffectAccent(u8),
}

const NUM_SCALARS: usize = 9;
const NUM_SLOTS: usize = NUM_SCALARS + 2 * NUM_ACCENTS;

impl TrackParam {
    fn slot(self) -> usize {
        match self {
            Self::Volume => 0,
            Self::StereoPosition => 1,
            Self::HurryUp => 2,
            Self::Detune => 3,
            Self::EarlyLate => 4,
            Self::DurationAdjust => 5,
            Self::Transpose => 6,
            Self::PitchDisplacementDepth => 7,
            Self::PitchDisplacementRate => 8,
            Self::Accent(i) => NUM_SCALARS + (usize::from(i) % NUM_ACCENTS),
            Self::EffectAccent(i) => NUM_SCALARS + NUM_ACCENTS + (usize::from(i) % NUM_ACCENTS),
        }
    }

    /// Value before any command.
    pub fn default_value(self) -> f64 {
        match self {
            Self::Volume
            | Self::HurryUp
            | Self::DurationAdjust
            | Self::PitchDisplacementDepth
            | Self::PitchDisplacementRate => 1.0,
            _ => 0.0,
        }
    }

    /// Score name of this parameter.
    pub fn name(self) -> &'static str {
        COMMAND_TABLE
            .iter()
            .find(|(_, p)| *p == self)
            .map_or("?", |(name, _)| name)
    }
}

/// Score names and the parameters they address.
pub const COMMAND_TABLE: &[(&str, TrackParam)] = &[
    ("volume", TrackParam::Volume),
    ("stereo", TrackParam::StereoPosition),
    ("accent1", TrackParam::Accent(0)),
    ("accent2", TrackParam::Accent(1)),
    ("accent3", TrackParam::Accent(2)),
    ("accent4", TrackParam::Accent(3)),
    ("accent5", TrackParam::Accent(4)),
    ("accent6", TrackParam::Accent(5)),
    ("accent7", TrackParam::Accent(6)),
    ("accent8", TrackParam::Accent(7)),
    ("hurryup", TrackParam::HurryUp),
    ("detune", TrackParam::Detune),
    ("earlylate", TrackParam::EarlyLate),
    ("duration", TrackParam::DurationAdjust),
    ("transpose", TrackParam::Transpose),
    ("pitchdispdepth", TrackParam::PitchDisplacementDepth),
    ("pitchdisprate", TrackParam::PitchDisplacementRate),
    ("effectaccent1", TrackParam::EffectAccent(0)),
    ("effectaccent2", TrackParam::EffectAccent(1)),
    ("effectaccent3", TrackParam::EffectAccent(2)),
    ("effectaccent4", TrackParam::EffectAccent(3)),
    ("effectaccent5", TrackParam::EffectAccent(4)),
    ("effectaccent6", TrackParam::EffectAccent(5)),
    ("effectaccent7", TrackParam::EffectAccent(6)),
    ("effectaccent8", TrackParam::EffectAccent(7)),
];

/// What a command does to its parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ParamOp {
    /// Jump to a value.
    Set(f64),
    /// Add to the current value.
    Adjust(f64),
    /// Multiply the current value.
    Scale(f64),
    /// Sweep linearly to `target` over `ticks`.
    SweepTo {
        /// Final value.
        target: f64,
        /// Sweep length in envelope ticks.
        ticks: u32,
    },
    /// Sweep linearly by `delta` over `ticks`.
    SweepBy {
        /// Change over the sweep.
        delta: f64,
        /// Sweep length in envelope ticks.
        ticks: u32,
    },
}

/// One track command.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    /// Target parameter.
    pub param: TrackParam,
    /// Operation.
    pub op: ParamOp,
}

impl Command {
    /// Parses the textual form, e.g. `"sweepto volume 0.5 100"`.
    ///
    /// Names are case-insensitive.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |why: &str| SynthError::InvalidCommand(format!("{why}: \"{text}\""));
        let mut words = text.split_whitespace();
        let verb = words.next().ok_or_else(|| invalid("empty command"))?;
        let name = words.next().ok_or_else(|| invalid("missing parameter"))?;
        let param = COMMAND_TABLE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, p)| p)
            .ok_or_else(|| invalid("unknown parameter"))?;
        let number = |word: Option<&str>| -> Result<f64> {
            word.ok_or_else(|| invalid("missing value"))?
                .parse::<f64>()
                .map_err(|_| invalid("bad value"))
        };
        let ticks = |word: Option<&str>| -> Result<u32> {
            word.ok_or_else(|| invalid("missing tick count"))?
                .parse::<u32>()
                .map_err(|_| invalid("bad tick count"))
        };

        let op = match verb.to_ascii_lowercase().as_str() {
            "set" => ParamOp::Set(number(words.next())?),
            "adjust" => ParamOp::Adjust(number(words.next())?),
            "scale" => ParamOp::Scale(number(words.next())?),
            "sweepto" => ParamOp::SweepTo {
                target: number(words.next())?,
                ticks: ticks(words.next())?,
            },
            "sweepby" => ParamOp::SweepBy {
                delta: number(words.next())?,
                ticks: ticks(words.next())?,
            },
            _ => return Err(invalid("unknown operation")),
        };
        if words.next().is_some() {
            return Err(invalid("trailing input"));
        }
        Ok(Self { param, op })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.param.name();
        match self.op {
            ParamOp::Set(v) => write!(f, "set {name} {v}"),
            ParamOp::Adjust(v) => write!(f, "adjust {name} {v}"),
            ParamOp::Scale(v) => write!(f, "scale {name} {v}"),
            ParamOp::SweepTo { target, ticks } => write!(f, "sweepto {name} {target} {ticks}"),
            ParamOp::SweepBy { delta, ticks } => write!(f, "sweepby {name} {delta} {ticks}"),
        }
    }
}

impl core::str::FromStr for Command {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Current values of every track parameter.
#[derive(Debug, Clone)]
pub struct IncrParamUpdater {
    slots: [LinearTransition; NUM_SLOTS],
}

impl Default for IncrParamUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrParamUpdater {
    /// All parameters at their defaults.
    pub fn new() -> Self {
        let mut slots = [LinearTransition::settled(0.0); NUM_SLOTS];
        for &(_, param) in COMMAND_TABLE {
            slots[param.slot()] = LinearTransition::settled(param.default_value());
        }
        Self { slots }
    }

    /// Applies a command. Any sweep in progress on the same parameter is
    /// replaced, starting from its current value.
    pub fn apply(&mut self, command: &Command) {
        #[cfg(feature = "tracing")]
        tracing::debug!("params_apply: {command}");

        let slot = &mut self.slots[command.param.slot()];
        let current = slot.value();
        *slot = match command.op {
            ParamOp::Set(v) => LinearTransition::settled(v),
            ParamOp::Adjust(d) => LinearTransition::settled(current + d),
            ParamOp::Scale(s) => LinearTransition::settled(current * s),
            ParamOp::SweepTo { target, ticks } => LinearTransition::new(current, target, ticks),
            ParamOp::SweepBy { delta, ticks } => {
                LinearTransition::new(current, current + delta, ticks)
            }
        };
    }

    /// Advances every active sweep by `ticks` envelope ticks.
    pub fn update(&mut self, ticks: u32) {
        for slot in &mut self.slots {
            for _ in 0..ticks.min(slot.remaining()) {
                slot.step();
            }
        }
    }

    /// Current value of `param`.
    pub fn value(&self, param: TrackParam) -> f64 {
        self.slots[param.slot()].value()
    }

    /// True while any sweep is in progress.
    pub fn is_sweeping(&self) -> bool {
        self.slots.iter().any(|s| !s.is_done())
    }

    /// Live note accents.
    pub fn accents(&self) -> AccentVec {
        self.accent_block(NUM_SCALARS)
    }

    /// Live track-effect accents.
    pub fn effect_accents(&self) -> AccentVec {
        self.accent_block(NUM_SCALARS + NUM_ACCENTS)
    }

    fn accent_block(&self, start: usize) -> AccentVec {
        let mut out = AccentVec::ZERO;
        for (dst, slot) in out.0.iter_mut().zip(&self.slots[start..start + NUM_ACCENTS]) {
            *dst = slot.value();
        }
        out
    }
}
