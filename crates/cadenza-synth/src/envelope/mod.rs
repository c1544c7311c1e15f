//! Phase-sequenced envelopes evaluated once per envelope tick.
//!
//! An [`EnvelopeSpec`] lists phases, each a straight line (in amplitude or in
//! signed decibels) from the previous value to an endpoint over a duration.
//! [`EnvelopeTemplate`] validates a spec and resolves its formulas once per
//! instrument; [`EnvelopeState`] evaluates it for one note.
//!
//! # Sustain points
//!
//! Up to three [`SustainPoint`]s sit at phase ends:
//!
//! | kind | on arrival | release before arrival | release while holding |
//! |------|-----------|------------------------|-----------------------|
//! | `Skip` | hold | jump past the point | continue |
//! | `NoSkip` | hold | cancel the hold | continue |
//! | `ReleaseSkip` | pass through | jump past the point | - |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cadenza_synth::accent::AccentVec;
//! use cadenza_synth::envelope::{
//!     EnvelopeParams, EnvelopePhase, EnvelopeSpec, EnvelopeState, EnvelopeTemplate,
//! };
//! use cadenza_synth::formula::FunctionTable;
//!
//! let host = FunctionTable::new();
//! let spec = EnvelopeSpec::with_phases(
//!     0.0,
//!     vec![EnvelopePhase::linear(0.01, 1.0), EnvelopePhase::linear(0.02, 0.0)],
//! );
//! let template = Arc::new(EnvelopeTemplate::new(&spec, &host).unwrap());
//! let params = EnvelopeParams {
//!     accents: &AccentVec::ZERO,
//!     live_accents: &AccentVec::ZERO,
//!     pitch_hz: 440.0,
//!     loudness: 1.0,
//!     hurry_up: 1.0,
//!     envelope_rate: 1000.0,
//! };
//! let staged = EnvelopeState::new(&template, &params, &host).unwrap();
//! let mut env = staged.align(0);
//!
//! let mut peak = 0.0f64;
//! while !env.is_at_end() {
//!     peak = peak.max(env.update(440.0, &host).unwrap());
//! }
//! assert_eq!(peak, 1.0);
//! ```

mod spec;
mod state;

pub use spec::{
    EnvelopePhase, EnvelopeSpec, EnvelopeTemplate, NUM_SUSTAIN_POINTS, SustainKind, SustainPoint,
    TargetKind, Transition, phase_formula_signature, transform_signature,
};
pub use state::{EnvelopeParams, EnvelopeState, UpdateMode};
