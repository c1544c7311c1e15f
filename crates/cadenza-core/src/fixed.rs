//! 32.32 signed fixed-point phase accumulator.
//!
//! Table lookups and grain phases advance by fractional increments every
//! sample. Accumulating in floating point drifts; accumulating in fixed
//! point wraps and splits cleanly into an integer table index and a
//! fractional interpolation weight.
//!
//! ```rust
//! use cadenza_core::Fixed64;
//!
//! let mut phase = Fixed64::ZERO;
//! let step = Fixed64::from_f64(1.25);
//! phase = phase.wrapping_add(step);
//! phase = phase.wrapping_add(step);
//! assert_eq!(phase.int_part(), 2);
//! assert!((phase.frac_f64() - 0.5).abs() < 1e-9);
//! ```

use core::ops::{Add, AddAssign};

const FRAC_BITS: u32 = 32;
const ONE: f64 = 4_294_967_296.0;

/// 32.32 signed fixed-point number stored in an `i64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed64(i64);

impl Fixed64 {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Builds a value from raw 32.32 bits.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw 32.32 bits.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Integer value with zero fraction.
    pub const fn from_int(i: i32) -> Self {
        Self((i as i64) << FRAC_BITS)
    }

    /// Converts from floating point. Out-of-range values saturate.
    pub fn from_f64(x: f64) -> Self {
        Self((x * ONE) as i64)
    }

    /// Converts to floating point.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / ONE
    }

    /// Integer part (floor toward negative infinity).
    #[inline]
    pub const fn int_part(self) -> i32 {
        (self.0 >> FRAC_BITS) as i32
    }

    /// Fractional bits as an unsigned 0.32 value.
    #[inline]
    pub const fn frac_bits(self) -> u32 {
        self.0 as u32
    }

    /// Fractional part in `[0, 1)`.
    #[inline]
    pub fn frac_f64(self) -> f64 {
        f64::from(self.frac_bits()) / ONE
    }

    /// Adds with two's-complement wraparound.
    #[inline]
    pub const fn wrapping_add(self, other: Self) -> Self {
        Self(self.0.wrapping_add(other.0))
    }

    /// Drops the integer part, keeping only the fraction.
    #[inline]
    pub const fn fraction_only(self) -> Self {
        Self(self.0 & 0xFFFF_FFFF)
    }

    /// Subtracts an integer amount, leaving the fraction untouched.
    #[inline]
    pub const fn sub_int(self, n: i32) -> Self {
        Self(self.0.wrapping_sub((n as i64) << FRAC_BITS))
    }

    /// Reduces the integer part modulo `len`, keeping the fraction.
    ///
    /// `len` must be non-zero.
    #[inline]
    pub fn wrap_int(self, len: u32) -> Self {
        let int = i64::from(self.int_part()).rem_euclid(i64::from(len));
        Self((int << FRAC_BITS) | i64::from(self.frac_bits()))
    }
}

impl Add for Fixed64 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl AddAssign for Fixed64 {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.wrapping_add(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_fraction_split() {
        let x = Fixed64::from_f64(3.75);
        assert_eq!(x.int_part(), 3);
        assert_eq!(x.frac_bits(), 0xC000_0000);
        assert!((x.to_f64() - 3.75).abs() < 1e-12);
    }

    #[test]
    fn negative_values_floor() {
        let x = Fixed64::from_f64(-0.25);
        assert_eq!(x.int_part(), -1);
        assert!((x.frac_f64() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn wrap_int_keeps_fraction() {
        let x = Fixed64::from_f64(9.5).wrap_int(4);
        assert_eq!(x.int_part(), 1);
        assert!((x.frac_f64() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn fraction_only_and_sub_int() {
        let x = Fixed64::from_f64(5.125);
        assert_eq!(x.fraction_only().int_part(), 0);
        assert_eq!(x.sub_int(5).int_part(), 0);
        assert_eq!(x.sub_int(5), x.fraction_only());
    }

    #[test]
    fn add_operators() {
        let mut x = Fixed64::from_int(1);
        x += Fixed64::from_f64(0.5);
        assert_eq!(x + Fixed64::from_f64(0.5), Fixed64::from_int(2));
    }
}
