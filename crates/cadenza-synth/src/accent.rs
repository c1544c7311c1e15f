//! Eight-component accent vectors.

use core::ops::{Add, Index, IndexMut};

/// Number of accent components carried by notes and tracks.
pub const NUM_ACCENTS: usize = 8;

/// Per-note expressive parameters.
///
/// Note accents and live track accents combine additively; envelope phases
/// weight the combined vector to scale their durations and endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccentVec(pub [f64; NUM_ACCENTS]);

impl AccentVec {
    /// All components zero.
    pub const ZERO: Self = Self([0.0; NUM_ACCENTS]);

    /// Component-wise sum.
    pub fn combined(&self, other: &Self) -> Self {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a += *b;
        }
        out
    }

    /// Weighted sum `Σ self[i] * weights[i]`.
    pub fn dot(&self, weights: &Self) -> f64 {
        self.0.iter().zip(weights.0.iter()).map(|(a, w)| a * w).sum()
    }

    /// Components as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// True when every component is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&a| a == 0.0)
    }
}

impl Add for AccentVec {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.combined(&rhs)
    }
}

impl Index<usize> for AccentVec {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for AccentVec {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}
