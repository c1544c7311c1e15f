//! Whole-instrument reference check.
//!
//! [`check_unreferenced_things`] walks an instrument in declaration order
//! and reports the first wave table, sample, function or processor that
//! cannot be resolved, before any note is played. Each reference is
//! resolved exactly the way template construction resolves it, so an
//! instrument that passes here builds.

use crate::bank::InstrumentSpec;
use crate::effect::{EffectChainTemplate, EffectRole};
use crate::error::Result;
use crate::formula::FormulaHost;
use crate::lfo::LfoTemplate;
use crate::modulation::ModulatedTemplate;
use crate::oscillator::{OscillatorSource, OscillatorSpec};
use crate::pluggable::{PluggableRegistry, PluggableTemplate};
use crate::wavetable::WaveLibrary;

/// Checks every name `spec` references against `library`, `host` and
/// `registry`. The first failure is returned.
pub fn check_unreferenced_things(
    spec: &InstrumentSpec,
    library: &WaveLibrary,
    host: &dyn FormulaHost,
    registry: &PluggableRegistry,
) -> Result<()> {
    for oscillator in &spec.oscillators {
        check_oscillator(oscillator, library, host, registry)?;
    }
    for lfo in &spec.pitch_lfo {
        LfoTemplate::new(lfo, host)?;
    }
    EffectChainTemplate::new(&spec.combined_effects, EffectRole::Oscillator, registry, host)?;
    EffectChainTemplate::new(&spec.track_effects, EffectRole::Track, registry, host)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(
        "instrument references resolved: {} oscillators",
        spec.oscillators.len()
    );
    Ok(())
}

fn check_oscillator(
    spec: &OscillatorSpec,
    library: &WaveLibrary,
    host: &dyn FormulaHost,
    registry: &PluggableRegistry,
) -> Result<()> {
    match &spec.source {
        OscillatorSource::WaveTable { table } => {
            library.wave_table(table)?;
        }
        OscillatorSource::Fof { table, rate, .. } => {
            library.wave_table(table)?;
            ModulatedTemplate::new(rate, host)?;
        }
        OscillatorSource::Sampled { sample } => {
            library.sample(sample)?;
        }
        OscillatorSource::Pluggable(binding) => {
            PluggableTemplate::new(binding, EffectRole::Oscillator, registry, host)?;
        }
        OscillatorSource::Fm { .. } | OscillatorSource::Algorithmic { .. } => {}
    }
    ModulatedTemplate::new(&spec.loudness, host)?;
    ModulatedTemplate::new(&spec.index, host)?;
    EffectChainTemplate::new(&spec.effects, EffectRole::Oscillator, registry, host)?;
    Ok(())
}
