//! Per-sample gain ramps.
//!
//! When a control value changes between two ticks, the sample pass spreads
//! the change across the block instead of stepping. The ramp starts one
//! increment past `from` and its last sample is exactly `to`, so consecutive
//! blocks join without a repeated or skipped value.

/// Recurrence used to fill a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampMode {
    /// `v[n] = v[n-1] + (to - from) / len`
    Additive,
    /// `v[n] = v[n-1] * (to / from)^(1/len)`
    ///
    /// Falls back to [`RampMode::Additive`] when either endpoint is zero or
    /// the endpoints differ in sign.
    Multiplicative,
}

/// Fills `buf` with a ramp from `from` (exclusive) to `to` (inclusive).
///
/// ```rust
/// use cadenza_core::{RampMode, fill_ramp};
///
/// let mut buf = [0.0f32; 4];
/// fill_ramp(&mut buf, 0.0, 1.0, RampMode::Additive);
/// assert_eq!(buf, [0.25, 0.5, 0.75, 1.0]);
/// ```
pub fn fill_ramp(buf: &mut [f32], from: f64, to: f64, mode: RampMode) {
    let len = buf.len();
    if len == 0 {
        return;
    }
    let geometric = mode == RampMode::Multiplicative
        && from != 0.0
        && to != 0.0
        && from.is_sign_negative() == to.is_sign_negative();

    let mut value = from;
    if geometric {
        let ratio = libm::pow(to / from, 1.0 / len as f64);
        for out in buf.iter_mut() {
            value *= ratio;
            *out = value as f32;
        }
    } else {
        let increment = (to - from) / len as f64;
        for out in buf.iter_mut() {
            value += increment;
            *out = value as f32;
        }
    }
    buf[len - 1] = to as f32;
}
