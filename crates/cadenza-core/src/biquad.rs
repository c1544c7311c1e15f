//! Second-order IIR sections and their coefficient designs.
//!
//! [`Biquad`] is a Direct Form I section processing `f32` samples.
//! [`BiquadCoefficients`] holds normalized coefficients computed in `f64`
//! from the RBJ Audio EQ Cookbook, which is the bilinear transform of the
//! analog prototypes with the cutoff pre-warped.

use core::f64::consts::PI;
use libm::{cos, pow, sin, sqrt};

/// Normalized biquad coefficients (`a0 == 1`).
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    /// Feedforward coefficient for `x[n]`.
    pub b0: f64,
    /// Feedforward coefficient for `x[n-1]`.
    pub b1: f64,
    /// Feedforward coefficient for `x[n-2]`.
    pub b2: f64,
    /// Feedback coefficient for `y[n-1]`.
    pub a1: f64,
    /// Feedback coefficient for `y[n-2]`.
    pub a2: f64,
}

/// Shared RBJ intermediates: `(cos w, sin w)`.
fn omega(frequency: f64, sample_rate: f64) -> (f64, f64) {
    let w = 2.0 * PI * frequency / sample_rate;
    (cos(w), sin(w))
}

impl BiquadCoefficients {
    /// Passthrough: `y[n] = x[n]`.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Builds normalized coefficients from raw `(b0, b1, b2, a0, a1, a2)`.
    pub fn from_raw(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let inv = 1.0 / a0;
        Self {
            b0: b0 * inv,
            b1: b1 * inv,
            b2: b2 * inv,
            a1: a1 * inv,
            a2: a2 * inv,
        }
    }

    /// Low-pass at `frequency` with quality factor `q`.
    pub fn lowpass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let (c, s) = omega(frequency, sample_rate);
        let alpha = s / (2.0 * q);
        Self::from_raw(
            (1.0 - c) / 2.0,
            1.0 - c,
            (1.0 - c) / 2.0,
            1.0 + alpha,
            -2.0 * c,
            1.0 - alpha,
        )
    }

    /// High-pass at `frequency` with quality factor `q`.
    pub fn highpass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let (c, s) = omega(frequency, sample_rate);
        let alpha = s / (2.0 * q);
        Self::from_raw(
            (1.0 + c) / 2.0,
            -(1.0 + c),
            (1.0 + c) / 2.0,
            1.0 + alpha,
            -2.0 * c,
            1.0 - alpha,
        )
    }

    /// Band-pass with 0 dB peak gain. `bandwidth` is in Hz.
    pub fn bandpass(frequency: f64, bandwidth: f64, sample_rate: f64) -> Self {
        let q = frequency / bandwidth.max(1e-6);
        let (c, s) = omega(frequency, sample_rate);
        let alpha = s / (2.0 * q);
        Self::from_raw(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * c, 1.0 - alpha)
    }

    /// Band-reject (notch). `bandwidth` is in Hz.
    pub fn notch(frequency: f64, bandwidth: f64, sample_rate: f64) -> Self {
        let q = frequency / bandwidth.max(1e-6);
        let (c, s) = omega(frequency, sample_rate);
        let alpha = s / (2.0 * q);
        Self::from_raw(1.0, -2.0 * c, 1.0, 1.0 + alpha, -2.0 * c, 1.0 - alpha)
    }

    /// Peaking equalizer. `bandwidth` is in Hz, `gain_db` boosts or cuts.
    pub fn peaking(frequency: f64, bandwidth: f64, gain_db: f64, sample_rate: f64) -> Self {
        let q = frequency / bandwidth.max(1e-6);
        let a = pow(10.0, gain_db / 40.0);
        let (c, s) = omega(frequency, sample_rate);
        let alpha = s / (2.0 * q);
        Self::from_raw(
            1.0 + alpha * a,
            -2.0 * c,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * c,
            1.0 - alpha / a,
        )
    }

    /// Low shelf with shelf `slope` (1.0 is the steepest monotonic slope).
    pub fn low_shelf(frequency: f64, slope: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = pow(10.0, gain_db / 40.0);
        let (c, s) = omega(frequency, sample_rate);
        let alpha = shelf_alpha(a, s, slope);
        let k = 2.0 * sqrt(a) * alpha;
        Self::from_raw(
            a * ((a + 1.0) - (a - 1.0) * c + k),
            2.0 * a * ((a - 1.0) - (a + 1.0) * c),
            a * ((a + 1.0) - (a - 1.0) * c - k),
            (a + 1.0) + (a - 1.0) * c + k,
            -2.0 * ((a - 1.0) + (a + 1.0) * c),
            (a + 1.0) + (a - 1.0) * c - k,
        )
    }

    /// High shelf with shelf `slope` (1.0 is the steepest monotonic slope).
    pub fn high_shelf(frequency: f64, slope: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = pow(10.0, gain_db / 40.0);
        let (c, s) = omega(frequency, sample_rate);
        let alpha = shelf_alpha(a, s, slope);
        let k = 2.0 * sqrt(a) * alpha;
        Self::from_raw(
            a * ((a + 1.0) + (a - 1.0) * c + k),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * c),
            a * ((a + 1.0) + (a - 1.0) * c - k),
            (a + 1.0) - (a - 1.0) * c + k,
            2.0 * ((a - 1.0) - (a + 1.0) * c),
            (a + 1.0) - (a - 1.0) * c - k,
        )
    }
}

fn shelf_alpha(a: f64, sin_w: f64, slope: f64) -> f64 {
    let slope = slope.clamp(1e-3, 1.0);
    let inner = (a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0;
    sin_w / 2.0 * sqrt(inner.max(0.0))
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Direct Form I biquad section.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Creates a passthrough section with cleared history.
    pub fn new() -> Self {
        Self::with_coefficients(&BiquadCoefficients::IDENTITY)
    }

    /// Creates a section with the given coefficients and cleared history.
    pub fn with_coefficients(coefficients: &BiquadCoefficients) -> Self {
        let mut biquad = Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        };
        biquad.set_coefficients(coefficients);
        biquad
    }

    /// Replaces the coefficients, keeping history.
    pub fn set_coefficients(&mut self, coefficients: &BiquadCoefficients) {
        self.b0 = coefficients.b0 as f32;
        self.b1 = coefficients.b1 as f32;
        self.b2 = coefficients.b2 as f32;
        self.a1 = coefficients.a1 as f32;
        self.a2 = coefficients.a2 as f32;
    }

    /// Processes one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Processes `input` into `output` sample by sample.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.process(x);
        }
    }

    /// Clears the delay lines, keeping coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}
