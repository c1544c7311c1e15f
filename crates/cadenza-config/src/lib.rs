//! Project files for the cadenza synthesis engine.
//!
//! A project bundles everything needed to render one track: the engine
//! settings, the wave tables and samples the instrument plays, the
//! instrument itself, and a score of notes and track commands. Projects are
//! stored as TOML.
//!
//! # Features
//!
//! - **Projects**: Load and save [`Project`] files
//! - **Wave tables**: Literal or additive frames in pitch ranges
//! - **Scores**: Notes and commands resolved to envelope ticks
//! - **Built-in formulas**: A native function table usable without a
//!   scripting runtime
//!
//! # Example
//!
//! ```rust,no_run
//! use cadenza_config::{Project, builtin_functions};
//! use cadenza_synth::PluggableRegistry;
//!
//! let project = Project::load("pad.toml").unwrap();
//! let library = project
//!     .validate(&builtin_functions(), &PluggableRegistry::new())
//!     .unwrap();
//! println!(
//!     "{}: {} oscillators, {} wave tables",
//!     project.name,
//!     project.instrument.oscillators.len(),
//!     library.wave_table_names().count(),
//! );
//!
//! project.save("backup/pad.toml").unwrap();
//! ```

mod error;
mod project;

/// Built-in native formulas.
pub mod builtins;

/// Score timeline.
pub mod score;

/// Wave table and sample definitions.
pub mod wave;

pub use builtins::{BUILTIN_NAMES, builtin_functions};
pub use error::ConfigError;
pub use project::Project;
pub use score::{Score, ScoreCommand, ScoreEvent, ScoreEventKind, ScoreNote};
pub use wave::{FrameDef, SampleDef, WaveRange, WaveTableDef, build_library};
