//! Built-in filter kinds and their per-channel runtime state.

use cadenza_core::{Biquad, BiquadCoefficients, OnePole, OnePoleMode};
use core::ops::BitOr;

use super::resonant_lowpass2::ResonantLowpass2;
use crate::error::Result;

/// Filter response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FilterKind {
    /// Passes the input through; only the output multiplier applies.
    #[default]
    Null,
    /// One-pole lowpass.
    LowPass6,
    /// One-pole highpass.
    HighPass6,
    /// Butterworth second-order lowpass.
    Lowpass,
    /// Butterworth second-order highpass.
    Highpass,
    /// Band-pass; bandwidth in Hz.
    Bandpass,
    /// Band-reject; bandwidth in Hz.
    Bandreject,
    /// Peaking equalizer; bandwidth in Hz, gain in dB.
    ParametricEq,
    /// Low shelf; slope and gain in dB.
    LowShelf,
    /// High shelf; slope and gain in dB.
    HighShelf,
    /// Second-order lowpass; bandwidth is the Q.
    ResonantLowpass,
    /// Cascaded lowpass of order 2, 4 or 6; bandwidth is the resonance.
    ResonantLowpass2,
}

impl FilterKind {
    /// Parameters this kind reads.
    ///
    /// Every kind reads the cutoff, [`FilterKind::Null`] included.
    pub const fn params_mask(self) -> ParamsMask {
        match self {
            Self::Null | Self::LowPass6 | Self::HighPass6 | Self::Lowpass | Self::Highpass => {
                ParamsMask::CUTOFF
            }
            Self::Bandpass | Self::Bandreject | Self::ResonantLowpass | Self::ResonantLowpass2 => {
                ParamsMask::CUTOFF.union(ParamsMask::BANDWIDTH_OR_SLOPE)
            }
            Self::ParametricEq | Self::LowShelf | Self::HighShelf => ParamsMask::CUTOFF
                .union(ParamsMask::BANDWIDTH_OR_SLOPE)
                .union(ParamsMask::GAIN),
        }
    }
}

/// Set of filter parameters a kind consumes.
///
/// ```rust
/// use cadenza_synth::filter::{FilterKind, ParamsMask};
///
/// let mask = FilterKind::ParametricEq.params_mask();
/// assert!(mask.contains(ParamsMask::GAIN));
/// assert!(FilterKind::Null.params_mask().contains(ParamsMask::CUTOFF));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamsMask(u8);

impl ParamsMask {
    /// No parameters.
    pub const NONE: Self = Self(0);
    /// Cutoff or center frequency in Hz.
    pub const CUTOFF: Self = Self(1 << 0);
    /// Bandwidth, shelf slope, or resonance.
    pub const BANDWIDTH_OR_SLOPE: Self = Self(1 << 1);
    /// Gain in dB.
    pub const GAIN: Self = Self(1 << 2);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two masks.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for ParamsMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Channels a filter slot processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FilterChannel {
    /// Left only.
    Left,
    /// Right only.
    Right,
    /// Both, with independent history.
    #[default]
    Both,
}

impl FilterChannel {
    /// Whether the left channel is processed.
    pub fn has_left(self) -> bool {
        matches!(self, Self::Left | Self::Both)
    }

    /// Whether the right channel is processed.
    pub fn has_right(self) -> bool {
        matches!(self, Self::Right | Self::Both)
    }
}

/// Parameter values handed to a filter each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Cutoff or center frequency in Hz.
    pub cutoff: f64,
    /// Bandwidth in Hz, shelf slope, or resonance.
    pub bandwidth_or_slope: f64,
    /// Gain in dB.
    pub gain: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            cutoff: 1000.0,
            bandwidth_or_slope: 1.0,
            gain: 0.0,
        }
    }
}

/// One channel of one filter slot.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Identity.
    Null,
    /// One-pole lowpass or highpass.
    OnePole(OnePole),
    /// Single biquad of the given kind.
    Biquad {
        /// Design used on retune.
        kind: FilterKind,
        /// Section state.
        section: Biquad,
        /// Last design inputs.
        last: Option<FilterParams>,
        /// Design sample rate.
        sample_rate: f64,
    },
    /// Cascaded resonant lowpass.
    ResonantLowpass2(ResonantLowpass2),
}

impl Filter {
    /// Creates an untuned filter of `kind`.
    pub fn new(kind: FilterKind, order: u32, broken: bool, sample_rate: f64) -> Result<Self> {
        Ok(match kind {
            FilterKind::Null => Self::Null,
            FilterKind::LowPass6 => {
                Self::OnePole(OnePole::new(OnePoleMode::Lowpass, sample_rate, 1000.0))
            }
            FilterKind::HighPass6 => {
                Self::OnePole(OnePole::new(OnePoleMode::Highpass, sample_rate, 1000.0))
            }
            FilterKind::ResonantLowpass2 => {
                Self::ResonantLowpass2(ResonantLowpass2::new(order, broken, sample_rate)?)
            }
            _ => Self::Biquad {
                kind,
                section: Biquad::new(),
                last: None,
                sample_rate,
            },
        })
    }

    /// Retunes the filter.
    pub fn update_params(&mut self, params: &FilterParams) {
        match self {
            Self::Null => {}
            Self::OnePole(f) => f.set_frequency(params.cutoff.max(0.0)),
            Self::ResonantLowpass2(f) => f.set_params(params.cutoff, params.bandwidth_or_slope),
            Self::Biquad {
                kind,
                section,
                last,
                sample_rate,
            } => {
                if last.as_ref() == Some(params) {
                    return;
                }
                *last = Some(*params);
                section.set_coefficients(&design(*kind, params, *sample_rate));
            }
        }
    }

    /// Filters `input` into `output`.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        match self {
            Self::Null => output.copy_from_slice(&input[..output.len()]),
            Self::OnePole(f) => {
                for (out, &x) in output.iter_mut().zip(input) {
                    *out = f.process(x);
                }
            }
            Self::Biquad { section, .. } => section.process_block(input, output),
            Self::ResonantLowpass2(f) => f.process_block(input, output),
        }
    }
}

fn design(kind: FilterKind, params: &FilterParams, sample_rate: f64) -> BiquadCoefficients {
    let cutoff = params.cutoff.clamp(1.0, sample_rate * 0.49);
    let width = params.bandwidth_or_slope.max(1e-3);
    match kind {
        FilterKind::Lowpass => {
            BiquadCoefficients::lowpass(cutoff, core::f64::consts::FRAC_1_SQRT_2, sample_rate)
        }
        FilterKind::Highpass => {
            BiquadCoefficients::highpass(cutoff, core::f64::consts::FRAC_1_SQRT_2, sample_rate)
        }
        FilterKind::Bandpass => BiquadCoefficients::bandpass(cutoff, width, sample_rate),
        FilterKind::Bandreject => BiquadCoefficients::notch(cutoff, width, sample_rate),
        FilterKind::ParametricEq => {
            BiquadCoefficients::peaking(cutoff, width, params.gain, sample_rate)
        }
        FilterKind::LowShelf => BiquadCoefficients::low_shelf(cutoff, width, params.gain, sample_rate),
        FilterKind::HighShelf => {
            BiquadCoefficients::high_shelf(cutoff, width, params.gain, sample_rate)
        }
        FilterKind::ResonantLowpass => BiquadCoefficients::lowpass(cutoff, width, sample_rate),
        FilterKind::Null
        | FilterKind::LowPass6
        | FilterKind::HighPass6
        | FilterKind::ResonantLowpass2 => BiquadCoefficients::IDENTITY,
    }
}
