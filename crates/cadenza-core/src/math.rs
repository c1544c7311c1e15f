//! Level, pitch, and decibel-segment math.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - `f32` gain conversions for the sample path
//! - [`db_to_linear_f64`] / [`linear_to_db_f64`] - `f64` conversions for control values
//!
//! # Exponential Segments
//!
//! Envelope segments in the decibel domain interpolate between endpoints in
//! log-magnitude space. Magnitudes are clamped to [`EXP_SEG_THRESHOLD`] so
//! zero endpoints never reach `log(0)`, and the sign is carried separately so
//! a segment may run between negative values.
//!
//! | linear | log domain |
//! |--------|------------|
//! | `1.0` | `+90.3` |
//! | `1/32768` | `+0.0` |
//! | `0.0` | `+0.0` (clamped) |
//! | `-1/32768` | `-0.0` |
//! | `-1.0` | `-90.3` |
//!
//! # Pitch
//!
//! - [`half_steps_to_hz`] / [`hz_to_half_steps`] - equal temperament, 69 = A440

use libm::{exp2, expf, fabs, log2, log10, logf, pow};

/// Magnitude below which decibel-domain segments clamp.
pub const EXP_SEG_THRESHOLD: f64 = 1.0 / 32768.0;

/// Convert decibels to linear gain.
///
/// ```rust
/// use cadenza_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels. Inputs are floored at `1e-10`.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Convert decibels to linear gain in double precision.
#[inline]
pub fn db_to_linear_f64(db: f64) -> f64 {
    pow(10.0, db / 20.0)
}

/// Convert linear gain to decibels in double precision. Inputs are floored at `1e-300`.
#[inline]
pub fn linear_to_db_f64(linear: f64) -> f64 {
    20.0 * log10(linear.max(1e-300))
}

/// Maps a segment endpoint into the signed decibel domain.
///
/// The magnitude is clamped to [`EXP_SEG_THRESHOLD`] and expressed in
/// decibels above it; the sign of `x` (including the sign of zero) becomes
/// the sign of the result.
#[inline]
pub fn exp_seg_endpoint_to_log(x: f64) -> f64 {
    let magnitude = fabs(x).max(EXP_SEG_THRESHOLD);
    let db = 20.0 * log10(magnitude / EXP_SEG_THRESHOLD);
    if x.is_sign_negative() { -db } else { db }
}

/// Inverse of [`exp_seg_endpoint_to_log`].
///
/// `-0.0` maps to `-EXP_SEG_THRESHOLD`, so signed endpoints survive the
/// round trip.
#[inline]
pub fn exp_seg_endpoint_to_linear(log_value: f64) -> f64 {
    let magnitude = EXP_SEG_THRESHOLD * pow(10.0, fabs(log_value) / 20.0);
    if log_value.is_sign_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Equal-tempered pitch to frequency: half-step 69 is 440 Hz.
#[inline]
pub fn half_steps_to_hz(half_steps: f64) -> f64 {
    440.0 * exp2((half_steps - 69.0) / 12.0)
}

/// Frequency to equal-tempered pitch. Non-positive input is floored at `1e-9` Hz.
#[inline]
pub fn hz_to_half_steps(hz: f64) -> f64 {
    69.0 + 12.0 * log2(hz.max(1e-9) / 440.0)
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Flushes values below `1e-20` in magnitude to zero.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}
