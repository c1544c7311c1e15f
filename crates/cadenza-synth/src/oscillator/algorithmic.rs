//! Oscillator computing its waveform from the phase.

use core::f64::consts::TAU;

use cadenza_core::Fixed64;

use super::OscCommon;

/// Computed waveform of an [`AlgorithmicOscillator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AlgorithmicShape {
    /// Sine.
    Sine,
    /// Triangle; the index skews the peak.
    Triangle,
    /// 50% square.
    Square,
    /// Rising ramp.
    Ramp,
    /// Pulse; the index sets the width.
    Pulse,
}

impl AlgorithmicShape {
    /// Value at `phase` in `[0, 1)`; `width` is the fraction of the cycle
    /// before the triangle peak or pulse edge.
    pub fn value(self, phase: f64, width: f64) -> f64 {
        match self {
            Self::Sine => libm::sin(TAU * phase),
            Self::Triangle => {
                if phase < width {
                    -1.0 + 2.0 * phase / width
                } else {
                    1.0 - 2.0 * (phase - width) / (1.0 - width)
                }
            }
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Ramp => 2.0 * phase - 1.0,
            Self::Pulse => {
                if phase < width {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Index in `[-1, 1]` mapped to a width around one half.
fn width(index: f64) -> f64 {
    (0.5 + 0.5 * index).clamp(0.01, 0.99)
}

/// Oscillator computing a basic waveform from its phase.
#[derive(Debug)]
pub struct AlgorithmicOscillator {
    shape: AlgorithmicShape,
    sample_rate: f64,
    phase: Fixed64,
    increment: Fixed64,
}

impl AlgorithmicOscillator {
    pub(super) fn new(shape: AlgorithmicShape, sample_rate: f64) -> Self {
        Self {
            shape,
            sample_rate,
            phase: Fixed64::ZERO,
            increment: Fixed64::ZERO,
        }
    }

    pub(super) fn update(&mut self, common: &OscCommon) {
        self.increment = Fixed64::from_f64(common.pitch_hz() / self.sample_rate).fraction_only();
    }

    pub(super) fn generate(&mut self, common: &OscCommon, out: &mut [f32]) {
        let width = width(common.index());
        for x in out.iter_mut() {
            *x = self.shape.value(self.phase.frac_f64(), width) as f32;
            self.phase = (self.phase + self.increment).fraction_only();
        }
    }
}
