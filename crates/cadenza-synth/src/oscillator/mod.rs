//! Oscillators: the sound sources of an oscillator bank.
//!
//! Every oscillator shares the same control skeleton, held in
//! [`OscCommon`]: a loudness and an index parameter (each an envelope plus
//! LFOs), a pitch derived from the bank's note pitch, and a stereo split of
//! the loudness. The kind-specific part ([`OscillatorKind`]) turns that into
//! samples.
//!
//! Control runs once per envelope tick ([`Oscillator::update_envelopes`]);
//! generation runs once per block at the processing rate
//! ([`Oscillator::generate`]) and accumulates into the output.
//!
//! | kind | index controls |
//! |------|----------------|
//! | wave table | frame position across the table |
//! | FOF | frame position of newly launched grains |
//! | FM | modulation depth in cycles |
//! | algorithmic | pulse width / triangle skew |
//! | sampled | unused |
//! | pluggable | unused (parameters come from the processor's controls) |

mod algorithmic;
mod fm;
mod fof;
mod pluggable;
mod sampled;
mod wave_table;

pub use algorithmic::{AlgorithmicOscillator, AlgorithmicShape};
pub use fm::FmOscillator;
pub use fof::{FofCompression, FofExpansion, FofOscillator, MIN_GRAIN_DIFFERENTIAL};
pub use pluggable::PluggableOscillator;
pub use sampled::SampledOscillator;
pub use wave_table::WaveTableOscillator;

#[cfg(not(feature = "std"))]
use alloc::{string::String, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::context::SynthParams;
use crate::effect::{EffectChainTemplate, EffectRole, EffectSpec};
use crate::envelope::EnvelopeParams;
use crate::error::Result;
use crate::formula::FormulaHost;
use crate::modulation::{ModulatedParam, ModulatedSpec, ModulatedTemplate};
use crate::note::FrozenNote;
use crate::origin::{OriginAligned, Staged};
use crate::pluggable::{PluggableBinding, PluggableRegistry, PluggableTemplate};
use crate::wavetable::{MultiWaveTable, Sample, WaveLibrary};

/// What an oscillator plays.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum OscillatorSource {
    /// Looped single-cycle wave table.
    WaveTable {
        /// Library name.
        table: String,
    },
    /// Formant grains launched once per pitch period.
    Fof {
        /// Library name of the grain waveform.
        table: String,
        /// Grain playback rate in Hz (frames per second).
        rate: ModulatedSpec,
        /// What happens to active grains when a new one launches.
        #[cfg_attr(feature = "serde", serde(default))]
        compression: FofCompression,
        /// What happens when a grain runs off its end.
        #[cfg_attr(feature = "serde", serde(default))]
        expansion: FofExpansion,
    },
    /// Two-operator sine FM.
    Fm {
        /// Carrier frequency as a multiple of the pitch.
        carrier_ratio: f64,
        /// Modulator frequency as a multiple of the pitch.
        modulator_ratio: f64,
    },
    /// Computed waveform.
    Algorithmic {
        /// Waveform.
        shape: AlgorithmicShape,
    },
    /// Recorded sample.
    Sampled {
        /// Library name.
        sample: String,
    },
    /// Registry-provided processor run on silence.
    Pluggable(PluggableBinding),
}

impl OscillatorSource {
    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::WaveTable { .. } => "wave_table",
            Self::Fof { .. } => "fof",
            Self::Fm { .. } => "fm",
            Self::Algorithmic { .. } => "algorithmic",
            Self::Sampled { .. } => "sampled",
            Self::Pluggable(_) => "pluggable",
        }
    }
}

/// One oscillator slot of an instrument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OscillatorSpec {
    /// Sound source.
    pub source: OscillatorSource,
    /// Loudness envelope; scaled by the note loudness.
    #[cfg_attr(feature = "serde", serde(default = "unit_loudness"))]
    pub loudness: ModulatedSpec,
    /// Index envelope.
    #[cfg_attr(feature = "serde", serde(default))]
    pub index: ModulatedSpec,
    /// Multiplies the note pitch.
    #[cfg_attr(feature = "serde", serde(default = "unit_ratio"))]
    pub pitch_ratio: f64,
    /// Added to the scaled pitch, in Hz.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pitch_offset_hz: f64,
    /// Added to the note's stereo position.
    #[cfg_attr(feature = "serde", serde(default))]
    pub stereo_bias: f64,
    /// Per-oscillator effects.
    #[cfg_attr(feature = "serde", serde(default))]
    pub effects: Vec<EffectSpec>,
}

#[cfg(feature = "serde")]
fn unit_loudness() -> ModulatedSpec {
    ModulatedSpec::constant(1.0)
}

#[cfg(feature = "serde")]
fn unit_ratio() -> f64 {
    1.0
}

impl OscillatorSpec {
    /// An oscillator of `source` at full loudness.
    pub fn new(source: OscillatorSource) -> Self {
        Self {
            source,
            loudness: ModulatedSpec::constant(1.0),
            index: ModulatedSpec::constant(0.0),
            pitch_ratio: 1.0,
            pitch_offset_hz: 0.0,
            stereo_bias: 0.0,
            effects: Vec::new(),
        }
    }

    /// Formula names referenced by the envelopes, LFOs and effects.
    pub fn formula_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .loudness
            .formula_names()
            .chain(self.index.formula_names())
            .collect();
        match &self.source {
            OscillatorSource::Fof { rate, .. } => names.extend(rate.formula_names()),
            OscillatorSource::Pluggable(binding) => names.extend(binding.formula_names()),
            _ => {}
        }
        for effect in &self.effects {
            names.extend(effect.formula_names());
        }
        names
    }
}

#[derive(Debug, Clone)]
enum KindTemplate {
    WaveTable(Arc<MultiWaveTable>),
    Fof {
        table: Arc<MultiWaveTable>,
        rate: ModulatedTemplate,
        compression: FofCompression,
        expansion: FofExpansion,
    },
    Fm {
        carrier_ratio: f64,
        modulator_ratio: f64,
    },
    Algorithmic(AlgorithmicShape),
    Sampled(Arc<Sample>),
    Pluggable(PluggableTemplate),
}

/// Resolved [`OscillatorSpec`], shared by every note of an instrument.
#[derive(Debug, Clone)]
pub struct OscillatorTemplate {
    kind: KindTemplate,
    loudness: ModulatedTemplate,
    index: ModulatedTemplate,
    pitch_ratio: f64,
    pitch_offset_hz: f64,
    stereo_bias: f64,
    effects: Option<EffectChainTemplate>,
}

impl OscillatorTemplate {
    /// Resolves wave data, formulas and processors.
    pub fn new(
        spec: &OscillatorSpec,
        library: &WaveLibrary,
        registry: &PluggableRegistry,
        host: &dyn FormulaHost,
    ) -> Result<Self> {
        let kind = match &spec.source {
            OscillatorSource::WaveTable { table } => {
                KindTemplate::WaveTable(Arc::clone(library.wave_table(table)?))
            }
            OscillatorSource::Fof {
                table,
                rate,
                compression,
                expansion,
            } => KindTemplate::Fof {
                table: Arc::clone(library.wave_table(table)?),
                rate: ModulatedTemplate::new(rate, host)?,
                compression: *compression,
                expansion: *expansion,
            },
            OscillatorSource::Fm {
                carrier_ratio,
                modulator_ratio,
            } => KindTemplate::Fm {
                carrier_ratio: *carrier_ratio,
                modulator_ratio: *modulator_ratio,
            },
            OscillatorSource::Algorithmic { shape } => KindTemplate::Algorithmic(*shape),
            OscillatorSource::Sampled { sample } => {
                KindTemplate::Sampled(Arc::clone(library.sample(sample)?))
            }
            OscillatorSource::Pluggable(binding) => KindTemplate::Pluggable(PluggableTemplate::new(
                binding,
                EffectRole::Oscillator,
                registry,
                host,
            )?),
        };
        let effects = if spec.effects.is_empty() {
            None
        } else {
            Some(EffectChainTemplate::new(
                &spec.effects,
                EffectRole::Oscillator,
                registry,
                host,
            )?)
        };
        Ok(Self {
            kind,
            loudness: ModulatedTemplate::new(&spec.loudness, host)?,
            index: ModulatedTemplate::new(&spec.index, host)?,
            pitch_ratio: spec.pitch_ratio,
            pitch_offset_hz: spec.pitch_offset_hz,
            stereo_bias: spec.stereo_bias,
            effects,
        })
    }

    /// Per-oscillator effects, if any.
    pub fn effects(&self) -> Option<&EffectChainTemplate> {
        self.effects.as_ref()
    }

    /// Builds the oscillator for one note.
    pub fn instantiate(&self, note: &FrozenNote, synth: &SynthParams) -> Result<Staged<Oscillator>> {
        let host = synth.host();
        let params = note.envelope_params(synth.envelope_rate());
        let common = OscCommon::new(self, note, &params, host)?;
        let unit = EnvelopeParams {
            loudness: 1.0,
            ..params
        };
        let sample_rate = synth.sample_rate();
        let kind = match &self.kind {
            KindTemplate::WaveTable(table) => OscillatorKind::WaveTable(WaveTableOscillator::new(
                table,
                note.multisample_hz / note.pitch_hz,
                common.pitch_hz(),
                sample_rate,
            )),
            KindTemplate::Fof {
                table,
                rate,
                compression,
                expansion,
            } => OscillatorKind::Fof(FofOscillator::new(
                table,
                ModulatedParam::new(rate, &unit, host)?.into_child(),
                *compression,
                *expansion,
                common.pitch_hz(),
                sample_rate,
            )),
            KindTemplate::Fm {
                carrier_ratio,
                modulator_ratio,
            } => OscillatorKind::Fm(FmOscillator::new(*carrier_ratio, *modulator_ratio, sample_rate)),
            KindTemplate::Algorithmic(shape) => {
                OscillatorKind::Algorithmic(AlgorithmicOscillator::new(*shape, sample_rate))
            }
            KindTemplate::Sampled(sample) => {
                OscillatorKind::Sampled(SampledOscillator::new(sample, sample_rate))
            }
            KindTemplate::Pluggable(template) => {
                OscillatorKind::Pluggable(PluggableOscillator::new(template, &params, synth)?)
            }
        };
        let mut osc = Oscillator { common, kind };
        osc.common.pre_origin = osc.own_pre_origin();
        Ok(Staged::new(osc))
    }
}

/// Control state every oscillator kind shares.
#[derive(Debug, Clone)]
pub struct OscCommon {
    loudness: ModulatedParam,
    index: ModulatedParam,
    pitch_ratio: f64,
    pitch_offset_hz: f64,
    pan: f64,
    pitch_hz: f64,
    loudness_value: f64,
    index_value: f64,
    gains: [f32; 2],
    previous_gains: [f32; 2],
    active: bool,
    pre_origin: u32,
    start_countdown: u32,
}

impl OscCommon {
    fn new(
        template: &OscillatorTemplate,
        note: &FrozenNote,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<Self> {
        let unit = EnvelopeParams {
            loudness: 1.0,
            ..*params
        };
        let loudness = ModulatedParam::new(&template.loudness, params, host)?.into_child();
        let index = ModulatedParam::new(&template.index, &unit, host)?.into_child();
        let pan = (template.stereo_bias + note.stereo).clamp(-1.0, 1.0);
        let loudness_value = loudness.initial_value();
        let gains = split_gains(loudness_value, pan);
        Ok(Self {
            pitch_hz: note.pitch_hz * template.pitch_ratio + template.pitch_offset_hz,
            index_value: index.initial_value(),
            loudness,
            index,
            pitch_ratio: template.pitch_ratio,
            pitch_offset_hz: template.pitch_offset_hz,
            pan,
            loudness_value,
            gains,
            previous_gains: gains,
            active: true,
            pre_origin: 0,
            start_countdown: 0,
        })
    }

    fn update(&mut self, note_pitch_hz: f64, host: &dyn FormulaHost) -> Result<()> {
        self.pitch_hz = note_pitch_hz * self.pitch_ratio + self.pitch_offset_hz;
        self.loudness_value = self.loudness.update(self.pitch_hz, host)?;
        self.index_value = self.index.update(self.pitch_hz, host)?;
        self.previous_gains = self.gains;
        if self.start_countdown > 0 {
            self.start_countdown -= 1;
            self.active = false;
            self.gains = [0.0; 2];
        } else {
            self.active = true;
            self.gains = split_gains(self.loudness_value, self.pan);
        }
        Ok(())
    }

    /// Current pitch in Hz.
    pub fn pitch_hz(&self) -> f64 {
        self.pitch_hz
    }

    /// Current loudness.
    pub fn loudness(&self) -> f64 {
        self.loudness_value
    }

    /// Current index.
    pub fn index(&self) -> f64 {
        self.index_value
    }

    /// Stereo position in `[-1, 1]`.
    pub fn pan(&self) -> f64 {
        self.pan
    }

    /// `[left, right]` gains for this tick.
    pub fn gains(&self) -> [f32; 2] {
        self.gains
    }

    /// False while the oscillator waits out its start countdown.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once the loudness envelope has ended.
    pub fn loudness_at_end(&self) -> bool {
        self.loudness.is_at_end()
    }

    /// Accumulates `mono` into both channels with this tick's gains,
    /// ramping from the previous tick's gains when `interpolate` is set.
    pub fn mix(&self, mono: &[f32], left: &mut [f32], right: &mut [f32], interpolate: bool) {
        self.mix_stereo(mono, mono, left, right, interpolate);
    }

    /// Accumulates a stereo pair with this tick's gains.
    pub fn mix_stereo(
        &self,
        in_left: &[f32],
        in_right: &[f32],
        left: &mut [f32],
        right: &mut [f32],
        interpolate: bool,
    ) {
        let [from_l, from_r] = self.previous_gains;
        let [to_l, to_r] = self.gains;
        let len = left.len().min(right.len()).min(in_left.len()).min(in_right.len());
        if interpolate && self.previous_gains != self.gains && len > 0 {
            let step = 1.0 / len as f32;
            for i in 0..len {
                let t = (i + 1) as f32 * step;
                left[i] += in_left[i] * (from_l + (to_l - from_l) * t);
                right[i] += in_right[i] * (from_r + (to_r - from_r) * t);
            }
        } else {
            for i in 0..len {
                left[i] += in_left[i] * to_l;
                right[i] += in_right[i] * to_r;
            }
        }
    }

    fn modulated(&mut self) -> [&mut ModulatedParam; 2] {
        [&mut self.loudness, &mut self.index]
    }
}

/// `0.5·L·(1 ∓ pan)`.
fn split_gains(loudness: f64, pan: f64) -> [f32; 2] {
    [
        (0.5 * loudness * (1.0 - pan)) as f32,
        (0.5 * loudness * (1.0 + pan)) as f32,
    ]
}

/// Kind-specific oscillator state.
#[derive(Debug)]
pub enum OscillatorKind {
    /// Wave table.
    WaveTable(WaveTableOscillator),
    /// FOF grains.
    Fof(FofOscillator),
    /// Sine FM.
    Fm(FmOscillator),
    /// Computed waveform.
    Algorithmic(AlgorithmicOscillator),
    /// Recorded sample.
    Sampled(SampledOscillator),
    /// Pluggable processor.
    Pluggable(PluggableOscillator),
}

/// One oscillator playing one note.
#[derive(Debug)]
pub struct Oscillator {
    common: OscCommon,
    kind: OscillatorKind,
}

impl Oscillator {
    /// Advances every control one tick. `note_pitch_hz` is the bank's pitch
    /// after portamento and the pitch LFO.
    pub fn update_envelopes(&mut self, note_pitch_hz: f64, host: &dyn FormulaHost) -> Result<()> {
        self.common.update(note_pitch_hz, host)?;
        let common = &self.common;
        match &mut self.kind {
            OscillatorKind::WaveTable(o) => o.update(common),
            OscillatorKind::Fof(o) => o.update(common, host)?,
            OscillatorKind::Fm(o) => o.update(common),
            OscillatorKind::Algorithmic(o) => o.update(common),
            OscillatorKind::Sampled(o) => o.update(common),
            OscillatorKind::Pluggable(o) => o.update(common, host)?,
        }
        Ok(())
    }

    /// Renders one block and adds it to `left`/`right`.
    pub fn generate(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        let common = &self.common;
        if !common.is_active() {
            return Ok(());
        }
        match &mut self.kind {
            OscillatorKind::Fof(o) => {
                o.generate(common, left, right);
                Ok(())
            }
            OscillatorKind::Pluggable(o) => o.generate(common, left, right, synth),
            kind => {
                let len = left.len().min(right.len());
                let mut mono = synth.acquire(len)?;
                match kind {
                    OscillatorKind::WaveTable(o) => o.generate(&mut mono),
                    OscillatorKind::Fm(o) => o.generate(common, &mut mono),
                    OscillatorKind::Algorithmic(o) => o.generate(common, &mut mono),
                    OscillatorKind::Sampled(o) => o.generate(&mut mono),
                    OscillatorKind::Fof(_) | OscillatorKind::Pluggable(_) => {}
                }
                common.mix(&mono, left, right, synth.interpolate_intra_tick());
                Ok(())
            }
        }
    }

    /// Releases sustain point `index`.
    pub fn key_up_sustain(&mut self, index: usize) {
        for m in self.common.modulated() {
            m.key_up_sustain(index);
        }
        match &mut self.kind {
            OscillatorKind::Fof(o) => o.key_up_sustain(index),
            OscillatorKind::Sampled(o) => o.key_up_sustain(index),
            OscillatorKind::Pluggable(o) => o.key_up_sustain(index),
            _ => {}
        }
    }

    /// Restarts every envelope at its origin for a tied note.
    pub fn retrigger_from_origin(&mut self, note: &FrozenNote, synth: &SynthParams) -> Result<()> {
        let host = synth.host();
        let params = note.envelope_params(synth.envelope_rate());
        let unit = EnvelopeParams {
            loudness: 1.0,
            ..params
        };
        self.common.loudness.retrigger_from_origin(&params, host)?;
        self.common.index.retrigger_from_origin(&unit, host)?;
        self.common.start_countdown = 0;
        match &mut self.kind {
            OscillatorKind::Fof(o) => o.retrigger_from_origin(&unit, host)?,
            OscillatorKind::Pluggable(o) => o.retrigger_from_origin(&params, host)?,
            _ => {}
        }
        Ok(())
    }

    /// True once the oscillator can make no further sound.
    pub fn is_finished(&self) -> bool {
        let loudness_done = self.common.loudness_at_end();
        match &self.kind {
            OscillatorKind::WaveTable(o) => o.is_undefined() || loudness_done,
            OscillatorKind::Fof(o) => o.is_finished(loudness_done),
            OscillatorKind::Sampled(o) => o.is_exhausted() || loudness_done,
            _ => loudness_done,
        }
    }

    /// Shared control state.
    pub fn common(&self) -> &OscCommon {
        &self.common
    }

    /// Kind-specific state.
    pub fn kind(&self) -> &OscillatorKind {
        &self.kind
    }

    fn own_pre_origin(&self) -> u32 {
        let common = self
            .common
            .loudness
            .pre_origin_ticks()
            .max(self.common.index.pre_origin_ticks());
        let kind = match &self.kind {
            OscillatorKind::Fof(o) => o.pre_origin_ticks(),
            OscillatorKind::Pluggable(o) => o.pre_origin_ticks(),
            _ => 0,
        };
        common.max(kind)
    }
}

impl OriginAligned for Oscillator {
    fn pre_origin_ticks(&self) -> u32 {
        self.common.pre_origin
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        for m in self.common.modulated() {
            m.fix_origin(max_pre_origin);
        }
        match &mut self.kind {
            OscillatorKind::Fof(o) => o.fix_origin(max_pre_origin),
            OscillatorKind::Pluggable(o) => o.fix_origin(max_pre_origin),
            _ => {}
        }
        self.common.start_countdown = max_pre_origin.saturating_sub(self.common.pre_origin);
        if self.common.start_countdown > 0 {
            self.common.gains = [0.0; 2];
            self.common.previous_gains = [0.0; 2];
        }
    }
}
