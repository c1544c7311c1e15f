//! Cadenza Core - numeric and DSP primitives for the synthesis engine
//!
//! This crate holds the building blocks every layer of the engine leans on:
//! fixed-point phase arithmetic, tick-counted linear transitions, decibel math
//! for exponential envelope segments, IIR filter sections, and the scratch
//! buffer pool used by the per-tick signal pass.
//!
//! # Primitives
//!
//! ## Timing and interpolation
//!
//! - [`Fixed64`] - 32.32 signed fixed-point phase accumulator
//! - [`LinearTransition`] - linear interpolation over an exact number of steps
//! - [`RoundingCarry`] - rounding with carried residual so totals never drift
//!
//! ## Filters
//!
//! - [`Biquad`] - Direct Form I second-order section
//! - [`BiquadCoefficients`] - bilinear-transform designs (RBJ cookbook)
//! - [`OnePole`] - 6 dB/octave lowpass or highpass
//!
//! ## Buffers
//!
//! - [`fill_ramp`] - per-sample gain ramps (additive or geometric)
//! - [`ScratchPool`] - pre-allocated scratch regions with RAII borrow handles
//! - [`Upsampler`] / [`downsample_average`] - block rate conversion
//!
//! ## Math
//!
//! - [`db_to_linear`] / [`linear_to_db`] and their `f64` counterparts
//! - [`exp_seg_endpoint_to_log`] / [`exp_seg_endpoint_to_linear`] for
//!   signed decibel-domain interpolation
//! - [`half_steps_to_hz`] / [`hz_to_half_steps`]
//!
//! # no_std Support
//!
//! Disable the default `std` feature to use the crate on embedded targets:
//!
//! ```toml
//! [dependencies]
//! cadenza-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod biquad;
pub mod fixed;
pub mod math;
pub mod one_pole;
pub mod ramp;
pub mod resample;
pub mod scratch;
pub mod transition;

pub use biquad::{Biquad, BiquadCoefficients};
pub use fixed::Fixed64;
pub use math::{
    EXP_SEG_THRESHOLD, db_to_linear, db_to_linear_f64, exp_seg_endpoint_to_linear,
    exp_seg_endpoint_to_log, flush_denormal, half_steps_to_hz, hz_to_half_steps, lerp,
    linear_to_db, linear_to_db_f64,
};
pub use one_pole::{OnePole, OnePoleMode};
pub use ramp::{RampMode, fill_ramp};
pub use resample::{Upsampler, downsample_average};
pub use scratch::{ScratchBuffer, ScratchPool};
pub use transition::{LinearTransition, RoundingCarry};
