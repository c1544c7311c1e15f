//! Tick-counted interpolation and drift-free rounding.
//!
//! [`LinearTransition`] walks from a start value to an end value in an exact
//! number of steps and lands on the end value bit-for-bit, so envelope phase
//! boundaries never carry accumulated floating-point error into the next
//! phase.
//!
//! [`RoundingCarry`] rounds a sequence of fractional durations to whole ticks
//! while carrying the residual forward, keeping the rounded total within one
//! tick of the exact total no matter how many phases are rounded.

use libm::floor;

/// Linear ramp over a fixed number of steps.
///
/// ```rust
/// use cadenza_core::LinearTransition;
///
/// let mut t = LinearTransition::new(0.0, 1.0, 4);
/// assert_eq!(t.step(), 0.25);
/// t.step();
/// t.step();
/// assert_eq!(t.step(), 1.0);
/// assert!(t.is_done());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTransition {
    value: f64,
    end: f64,
    increment: f64,
    remaining: u32,
}

impl LinearTransition {
    /// Creates a transition from `start` to `end` over `steps` steps.
    ///
    /// With `steps == 0` the transition is already complete at `end`.
    pub fn new(start: f64, end: f64, steps: u32) -> Self {
        if steps == 0 {
            return Self::settled(end);
        }
        Self {
            value: start,
            end,
            increment: (end - start) / f64::from(steps),
            remaining: steps,
        }
    }

    /// A transition that is already complete at `value`.
    pub fn settled(value: f64) -> Self {
        Self {
            value,
            end: value,
            increment: 0.0,
            remaining: 0,
        }
    }

    /// Advances one step and returns the new value.
    ///
    /// The final step returns exactly `end`; further steps hold it.
    #[inline]
    pub fn step(&mut self) -> f64 {
        match self.remaining {
            0 => {}
            1 => {
                self.remaining = 0;
                self.value = self.end;
            }
            _ => {
                self.remaining -= 1;
                self.value += self.increment;
            }
        }
        self.value
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Target value.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Steps left before the target is reached.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// True once the target has been reached.
    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

impl Default for LinearTransition {
    fn default() -> Self {
        Self::settled(0.0)
    }
}

/// Round-half-up with a carried residual.
///
/// Each call rounds `x + carry` and stores what was rounded away. The carry
/// stays within `[-0.5, 0.5]`, so the sum of the rounded values is always
/// within one half of the sum of the inputs.
///
/// ```rust
/// use cadenza_core::RoundingCarry;
///
/// let mut carry = RoundingCarry::new();
/// let total: i64 = (0..10).map(|_| carry.round(2.3)).sum();
/// assert_eq!(total, 23);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundingCarry {
    error: f64,
}

impl RoundingCarry {
    /// Starts with no residual.
    pub fn new() -> Self {
        Self { error: 0.0 }
    }

    /// Rounds `x` plus the carried residual to the nearest integer.
    #[inline]
    pub fn round(&mut self, x: f64) -> i64 {
        let target = x + self.error;
        let rounded = floor(target + 0.5);
        self.error = target - rounded;
        rounded as i64
    }

    /// Current residual.
    pub fn error(&self) -> f64 {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_steps_is_settled() {
        let mut t = LinearTransition::new(3.0, 7.0, 0);
        assert!(t.is_done());
        assert_eq!(t.step(), 7.0);
    }

    #[test]
    fn lands_exactly_on_awkward_targets() {
        let mut t = LinearTransition::new(0.1, 0.7, 3);
        let mut last = 0.0;
        for _ in 0..3 {
            last = t.step();
        }
        assert_eq!(last, 0.7);
        assert_eq!(t.step(), 0.7);
    }

    #[test]
    fn carry_keeps_total_on_track() {
        let mut carry = RoundingCarry::new();
        let durations = [0.4, 0.4, 0.4, 0.4, 0.4];
        let total: i64 = durations.iter().map(|&d| carry.round(d)).sum();
        assert_eq!(total, 2);
        assert!(carry.error().abs() <= 0.5);
    }
}
