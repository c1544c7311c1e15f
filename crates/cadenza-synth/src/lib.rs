//! Cadenza Synth - tick-driven synthesis engine
//!
//! The engine runs at two rates. Control state (envelopes, LFOs, track
//! parameter sweeps, filter coefficients) advances once per envelope tick;
//! audio is then rendered for the block of samples belonging to that tick.
//! Every component follows the same lifecycle: an immutable *template* is
//! built once from a declarative spec, resolving every wave table, sample,
//! function and processor name up front, and a mutable *state* is
//! instantiated from it per note or per track.
//!
//! # Components
//!
//! ## Control
//!
//! - [`EnvelopeSpec`] / [`EnvelopeState`] - multi-phase envelopes with
//!   sustain points, release jumps, and formula-driven phase parameters
//! - [`LfoSpec`] / [`LfoList`] - stacked modulators applied to any
//!   envelope-driven value
//! - [`ModulatedParam`] - an envelope plus its LFO list
//! - [`IncrParamUpdater`] / [`Command`] - per-track parameters with sweeps
//! - [`fix_note_parameters`] - freezes a [`NoteEvent`] against track state
//!
//! ## Sound generation
//!
//! - [`OscBankTemplate`] / [`OscBankState`] - one note's oscillators,
//!   pitch LFO, portamento, and combined effects
//! - [`Oscillator`] - wave-table, FOF, FM, algorithmic, sampled, or
//!   pluggable source with stereo gain split
//!
//! ## Effects
//!
//! - [`FilterArray`] - a bank of filters sharing one control pass
//! - [`ResonantLowpass2`] - cascaded resonant lowpass with a broken mode
//! - [`IdealLowpass`] - windowed-sinc FIR lowpass
//! - [`TrackEffectGenerator`] - track effect chain with command queue and
//!   quiescence detection
//! - [`PluggableRegistry`] - named processors, including `user_effect`
//!
//! ## Validation
//!
//! - [`check_unreferenced_things`] - resolves every name an instrument
//!   references before a note is played
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cadenza_synth::{FunctionTable, SynthParams, SynthSettings};
//!
//! let settings = SynthSettings {
//!     sample_rate: 48000.0,
//!     envelope_rate: 480.0,
//!     ..SynthSettings::default()
//! };
//! let synth = SynthParams::new(settings, Arc::new(FunctionTable::new())).unwrap();
//! let mut clock = synth.block_clock();
//! assert_eq!(clock.next_len(), 100);
//! ```
//!
//! # no_std Support
//!
//! The engine allocates only when templates and states are built. Disable
//! the default `std` feature to use it without the standard library:
//!
//! ```toml
//! [dependencies]
//! cadenza-synth = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod accent;
pub mod bank;
pub mod context;
pub mod control;
pub mod effect;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod formula;
pub mod lfo;
pub mod modulation;
pub mod note;
pub mod origin;
pub mod oscillator;
pub mod params;
pub mod pluggable;
#[cfg(feature = "serde")]
mod serde_slots;
pub mod validate;
pub mod wavetable;

pub use accent::{AccentVec, NUM_ACCENTS};
pub use bank::{BankStart, InstrumentSpec, OscBankState, OscBankTemplate, PortamentoMode};
pub use context::{BlockClock, SynthParams, SynthSettings};
pub use control::ControlSpec;
pub use effect::{
    EffectChain, EffectChainTemplate, EffectRole, EffectSpec, IdealLowpass, IdealLowpassSpec,
    QuiescenceSpec, TrackEffectGenerator,
};
pub use envelope::{
    EnvelopeParams, EnvelopePhase, EnvelopeSpec, EnvelopeState, EnvelopeTemplate, SustainKind,
    SustainPoint, TargetKind, Transition, UpdateMode,
};
pub use error::{Result, SynthError, SynthErrorSubCode};
pub use filter::{
    Filter, FilterArray, FilterArrayTemplate, FilterChannel, FilterKind, FilterSpec,
    ResonantLowpass2,
};
pub use formula::{DataType, FormulaHost, FunctionTable, Signature, Value};
pub use lfo::{LfoAdding, LfoList, LfoModulation, LfoPolarity, LfoSpec, LfoWaveform};
pub use modulation::{ModulatedParam, ModulatedSpec, ModulatedTemplate};
pub use note::{FrozenNote, NoteEvent, ReleaseOrigin, ReleasePoint, fix_note_parameters};
pub use origin::{OriginAligned, Staged};
pub use oscillator::{
    AlgorithmicShape, FofCompression, FofExpansion, Oscillator, OscillatorSource, OscillatorSpec,
    OscillatorTemplate,
};
pub use params::{Command, IncrParamUpdater, ParamOp, TrackParam};
pub use pluggable::{
    PluggableBinding, PluggableConfig, PluggableProcessor, PluggableProcessorFactory,
    PluggableRegistry,
};
pub use validate::check_unreferenced_things;
pub use wavetable::{MultiWaveTable, Sample, WaveLibrary, WaveTable};
