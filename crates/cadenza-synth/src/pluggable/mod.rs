//! Pluggable processor framework.
//!
//! Built-in oscillators, filters and effects are closed enums. Processors
//! whose behavior comes from outside the engine (user formulas, extra native
//! DSP) plug in through three traits instead:
//!
//! - [`PluggableProcessorFactory`] validates a configuration and produces a
//!   template,
//! - [`PluggableProcessorTemplate`] describes the parameters, checks that
//!   every referenced function exists with the right signature, and creates
//!   runtime processors,
//! - [`PluggableProcessor`] receives parameter values once per tick and
//!   processes one block per call.
//!
//! Factories are looked up by name in a [`PluggableRegistry`].
//!
//! # Example
//!
//! ```rust
//! use cadenza_synth::effect::EffectRole;
//! use cadenza_synth::pluggable::{ConfigValue, PluggableConfig, PluggableRegistry};
//!
//! let registry = PluggableRegistry::new();
//! let mut config = PluggableConfig::new();
//! config.push("drive", ConfigValue::Number(4.0));
//! let template = registry.create_template("soft_clip", &config, EffectRole::Track).unwrap();
//! assert_eq!(template.param_defs()[0].name, "drive");
//! ```

mod registry;
mod soft_clip;
mod user_effect;

pub use registry::{PluggableRegistry, ProcessorDescriptor};
pub use soft_clip::SoftClipFactory;
pub use user_effect::UserEffectFactory;

#[cfg(not(feature = "std"))]
use alloc::{
    boxed::Box,
    collections::BTreeMap,
    format,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use core::fmt;
#[cfg(feature = "std")]
use std::{collections::BTreeMap, sync::Arc};

use crate::accent::AccentVec;
use crate::context::SynthParams;
use crate::control::{ControlSpec, ControlState, ControlTemplate};
use crate::effect::EffectRole;
use crate::envelope::EnvelopeParams;
use crate::error::{Result, SynthError};
use crate::formula::FormulaHost;
use crate::modulation::ModulatedParam;
use crate::origin::{OriginAligned, Staged};

/// Type of the values a configuration key accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueType {
    /// A name or other text.
    Text,
    /// A number.
    Number,
    /// An on/off switch.
    Flag,
}

/// One configuration value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ConfigValue {
    /// On/off switch.
    Flag(bool),
    /// Number.
    Number(f64),
    /// Name or other text.
    Text(String),
}

impl ConfigValue {
    /// Type of this value.
    pub fn value_type(&self) -> ConfigValueType {
        match self {
            Self::Flag(_) => ConfigValueType::Flag,
            Self::Number(_) => ConfigValueType::Number,
            Self::Text(_) => ConfigValueType::Text,
        }
    }

    /// Text content, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Switch state, if this is a flag.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

/// A configuration key a factory accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKeyDef {
    /// Key name.
    pub name: &'static str,
    /// Accepted value type.
    pub value_type: ConfigValueType,
    /// Minimum number of values (0 makes the key optional).
    pub min_count: usize,
    /// Maximum number of values.
    pub max_count: usize,
}

/// Keyed configuration handed to a factory.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PluggableConfig {
    entries: BTreeMap<String, Vec<ConfigValue>>,
}

impl PluggableConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to `key`.
    pub fn push(&mut self, key: &str, value: ConfigValue) -> &mut Self {
        self.entries.entry(key.to_string()).or_default().push(value);
        self
    }

    /// Appends a text value to `key`.
    pub fn push_text(&mut self, key: &str, value: &str) -> &mut Self {
        self.push(key, ConfigValue::Text(value.to_string()))
    }

    /// Values of `key`, empty when absent.
    pub fn get(&self, key: &str) -> &[ConfigValue] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// Text values of `key`.
    pub fn texts(&self, key: &str) -> impl Iterator<Item = &str> {
        self.get(key).iter().filter_map(ConfigValue::as_text)
    }

    /// First text value of `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.texts(key).next()
    }

    /// First numeric value of `key`.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).iter().find_map(ConfigValue::as_number)
    }

    /// First flag value of `key`.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).iter().find_map(ConfigValue::as_flag)
    }

    /// Every key and its values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ConfigValue])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Checks `config` against the keys a processor declares.
///
/// Rejects unknown keys, values of the wrong type, and value counts
/// outside `[min_count, max_count]`.
pub fn validate_config(processor: &str, keys: &[ConfigKeyDef], config: &PluggableConfig) -> Result<()> {
    for (name, values) in config.iter() {
        let Some(def) = keys.iter().find(|k| k.name == name) else {
            return Err(SynthError::invalid_config(processor, format!("unknown key '{name}'")));
        };
        if let Some(bad) = values.iter().find(|v| v.value_type() != def.value_type) {
            return Err(SynthError::invalid_config(
                processor,
                format!("key '{name}' expects {:?}, got {bad:?}", def.value_type),
            ));
        }
    }
    for def in keys {
        let count = config.get(def.name).len();
        if count < def.min_count || count > def.max_count {
            return Err(SynthError::invalid_config(
                processor,
                format!(
                    "key '{}' takes {}..={} values, got {count}",
                    def.name, def.min_count, def.max_count
                ),
            ));
        }
    }
    Ok(())
}

/// When a parameter's value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluggableParamKind {
    /// Updated every tick.
    Dynamic,
    /// Read once when the processor is created.
    Static,
}

/// A parameter a processor template exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct PluggableParamDef {
    /// Parameter name.
    pub name: String,
    /// Dynamic or static.
    pub kind: PluggableParamKind,
    /// Ramped per sample across each block.
    pub smoothed: bool,
    /// In oscillator role, receives the oscillator's loudness.
    pub is_loudness: bool,
    /// In oscillator role, receives the oscillator's pitch in Hz.
    pub is_pitch: bool,
    /// Value used when nothing drives the parameter.
    pub default: f64,
}

impl PluggableParamDef {
    /// A smoothed dynamic parameter.
    pub fn dynamic(name: &str, default: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: PluggableParamKind::Dynamic,
            smoothed: true,
            is_loudness: false,
            is_pitch: false,
            default,
        }
    }

    /// A static parameter.
    pub fn fixed(name: &str, default: f64) -> Self {
        Self {
            kind: PluggableParamKind::Static,
            smoothed: false,
            ..Self::dynamic(name, default)
        }
    }
}

/// Produces processor templates from a configuration.
pub trait PluggableProcessorFactory {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Accepted configuration keys.
    fn config_keys(&self) -> &'static [ConfigKeyDef];

    /// Builds a template from an already validated configuration.
    fn create_template(
        &self,
        config: &PluggableConfig,
        role: EffectRole,
    ) -> Result<Arc<dyn PluggableProcessorTemplate>>;
}

/// Shared, immutable description of a configured processor.
pub trait PluggableProcessorTemplate: fmt::Debug {
    /// Parameters in the order [`PluggableProcessor::update_params`]
    /// receives them.
    fn param_defs(&self) -> &[PluggableParamDef];

    /// Resolves every external function the processor will call.
    ///
    /// Pure: performs no evaluation.
    fn check_unreferenced_objects(&self, host: &dyn FormulaHost) -> Result<()>;

    /// Creates a runtime processor. `static_values` holds one value per
    /// parameter definition; dynamic entries carry their initial value.
    fn create(&self, synth: &SynthParams, static_values: &[f64]) -> Result<Box<dyn PluggableProcessor>>;
}

/// Runtime processor.
pub trait PluggableProcessor: fmt::Debug {
    /// Receives this tick's value for every parameter definition.
    fn update_params(&mut self, values: &[f64]);

    /// Processes one block in place.
    fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()>;
}

/// A named processor with its configuration and parameter controls.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PluggableBinding {
    /// Registry name of the factory.
    pub processor: String,
    /// Factory configuration.
    pub config: PluggableConfig,
    /// Controls for named parameters; others stay at their default.
    pub params: BTreeMap<String, ControlSpec>,
}

impl PluggableBinding {
    /// Binds `processor` with `config` and no parameter controls.
    pub fn new(processor: &str, config: PluggableConfig) -> Self {
        Self {
            processor: processor.to_string(),
            config,
            params: BTreeMap::new(),
        }
    }

    /// Formula names referenced by the parameter controls.
    pub fn formula_names(&self) -> impl Iterator<Item = &str> {
        self.params.values().flat_map(ControlSpec::formula_names)
    }
}

/// Resolved [`PluggableBinding`].
#[derive(Debug, Clone)]
pub struct PluggableTemplate {
    role: EffectRole,
    processor: Arc<dyn PluggableProcessorTemplate>,
    controls: Vec<ControlTemplate>,
}

impl PluggableTemplate {
    /// Creates the processor template, checks its functions, and resolves
    /// the parameter controls.
    pub fn new(
        binding: &PluggableBinding,
        role: EffectRole,
        registry: &PluggableRegistry,
        host: &dyn FormulaHost,
    ) -> Result<Self> {
        let processor = registry.create_template(&binding.processor, &binding.config, role)?;
        processor.check_unreferenced_objects(host)?;
        let defs = processor.param_defs();
        if let Some(unknown) = binding.params.keys().find(|k| !defs.iter().any(|d| &d.name == *k)) {
            return Err(SynthError::invalid_config(
                &binding.processor,
                format!("no parameter named '{unknown}'"),
            ));
        }
        let controls = defs
            .iter()
            .map(|def| match binding.params.get(&def.name) {
                Some(spec) => ControlTemplate::new(spec, role, host),
                None => Ok(ControlTemplate::Constant(def.default)),
            })
            .collect::<Result<Vec<_>>>()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "pluggable template '{}': {} params, {role:?} role",
            binding.processor,
            defs.len()
        );
        Ok(Self {
            role,
            processor,
            controls,
        })
    }

    /// Parameter definitions.
    pub fn param_defs(&self) -> &[PluggableParamDef] {
        self.processor.param_defs()
    }

    /// Role the controls were resolved for.
    pub fn role(&self) -> EffectRole {
        self.role
    }
}

/// Per-tick inputs for a pluggable processor's controls.
#[derive(Debug, Clone, Copy)]
pub struct PluggableInputs<'a> {
    /// Current pitch in Hz.
    pub pitch_hz: f64,
    /// Current loudness.
    pub loudness: f64,
    /// Track effect accents.
    pub accents: &'a AccentVec,
}

/// A running pluggable processor and the controls feeding it.
#[derive(Debug)]
pub struct PluggableEffect {
    role: EffectRole,
    defs: Vec<PluggableParamDef>,
    processor: Box<dyn PluggableProcessor>,
    controls: Vec<ControlState>,
    values: Vec<f64>,
}

impl PluggableEffect {
    /// Oscillator-role processor for one note.
    pub fn new_oscillator(
        template: &PluggableTemplate,
        params: &EnvelopeParams<'_>,
        synth: &SynthParams,
    ) -> Result<Staged<Self>> {
        let inputs = PluggableInputs {
            pitch_hz: params.pitch_hz,
            loudness: params.loudness,
            accents: &AccentVec::ZERO,
        };
        Self::build(template, Some(params), &inputs, synth).map(Staged::new)
    }

    /// Track-role processor.
    pub fn new_track(
        template: &PluggableTemplate,
        effect_accents: &AccentVec,
        synth: &SynthParams,
    ) -> Result<Self> {
        let inputs = PluggableInputs {
            pitch_hz: 0.0,
            loudness: 1.0,
            accents: effect_accents,
        };
        Self::build(template, None, &inputs, synth)
    }

    fn build(
        template: &PluggableTemplate,
        note: Option<&EnvelopeParams<'_>>,
        inputs: &PluggableInputs<'_>,
        synth: &SynthParams,
    ) -> Result<Self> {
        let mut controls = Vec::with_capacity(template.controls.len());
        let mut values = Vec::with_capacity(template.controls.len());
        for control in &template.controls {
            let (state, value) = ControlState::new(control, note, inputs.accents, synth.host())?;
            controls.push(state);
            values.push(value);
        }
        let defs = template.param_defs().to_vec();
        tag_values(template.role, &defs, &mut values, inputs);
        let mut processor = template.processor.create(synth, &values)?;
        processor.update_params(&values);
        Ok(Self {
            role: template.role,
            defs,
            processor,
            controls,
            values,
        })
    }

    /// Evaluates dynamic controls and hands the values to the processor.
    ///
    /// Static controls keep the value they had at creation and are not
    /// evaluated again.
    pub fn update(&mut self, inputs: &PluggableInputs<'_>, host: &dyn FormulaHost) -> Result<()> {
        for ((value, control), def) in self.values.iter_mut().zip(&mut self.controls).zip(&self.defs) {
            if def.kind == PluggableParamKind::Dynamic {
                *value = control.update(inputs.pitch_hz, inputs.accents, host)?;
            }
        }
        tag_values(self.role, &self.defs, &mut self.values, inputs);
        self.processor.update_params(&self.values);
        Ok(())
    }

    /// Runs the processor over one block.
    pub fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        self.processor.apply(left, right, synth)
    }

    /// Current parameter values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Releases sustain point `index` on every envelope-driven control.
    pub fn key_up_sustain(&mut self, index: usize) {
        for m in self.modulated() {
            m.key_up_sustain(index);
        }
    }

    /// Retriggers every envelope-driven control.
    pub fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        for m in self.modulated() {
            m.retrigger_from_origin(params, host)?;
        }
        Ok(())
    }

    fn modulated(&mut self) -> impl Iterator<Item = &mut ModulatedParam> {
        self.controls.iter_mut().filter_map(ControlState::modulated_mut)
    }
}

impl OriginAligned for PluggableEffect {
    fn pre_origin_ticks(&self) -> u32 {
        self.controls
            .iter()
            .filter_map(ControlState::modulated)
            .map(OriginAligned::pre_origin_ticks)
            .max()
            .unwrap_or(0)
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        for m in self.modulated() {
            m.fix_origin(max_pre_origin);
        }
    }
}

/// Overrides pitch- and loudness-tagged dynamic values in oscillator role.
fn tag_values(
    role: EffectRole,
    defs: &[PluggableParamDef],
    values: &mut [f64],
    inputs: &PluggableInputs<'_>,
) {
    if role != EffectRole::Oscillator {
        return;
    }
    for (value, def) in values.iter_mut().zip(defs) {
        if def.kind != PluggableParamKind::Dynamic {
            continue;
        }
        if def.is_pitch {
            *value = inputs.pitch_hz;
        } else if def.is_loudness {
            *value = inputs.loudness;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[ConfigKeyDef] = &[
        ConfigKeyDef {
            name: "data",
            value_type: ConfigValueType::Text,
            min_count: 1,
            max_count: 1,
        },
        ConfigKeyDef {
            name: "param",
            value_type: ConfigValueType::Text,
            min_count: 0,
            max_count: 4,
        },
    ];

    #[test]
    fn accepts_well_formed_config() {
        let mut config = PluggableConfig::new();
        config.push_text("data", "gain").push_text("param", "amount");
        assert!(validate_config("x", KEYS, &config).is_ok());
        assert_eq!(config.text("data"), Some("gain"));
    }

    #[test]
    fn rejects_unknown_key_wrong_type_and_arity() {
        let mut unknown = PluggableConfig::new();
        unknown.push_text("data", "gain").push_text("bogus", "1");
        assert!(validate_config("x", KEYS, &unknown).is_err());

        let mut wrong_type = PluggableConfig::new();
        wrong_type.push("data", ConfigValue::Number(1.0));
        assert!(validate_config("x", KEYS, &wrong_type).is_err());

        let missing = PluggableConfig::new();
        let err = validate_config("x", KEYS, &missing).unwrap_err();
        assert!(matches!(err, SynthError::InvalidProcessorConfig { .. }));

        let mut too_many = PluggableConfig::new();
        too_many.push_text("data", "a").push_text("data", "b");
        assert!(validate_config("x", KEYS, &too_many).is_err());
    }

    #[test]
    fn static_controls_are_evaluated_once() {
        use crate::accent::NUM_ACCENTS;
        use crate::context::SynthSettings;
        use crate::formula::{DataType, FunctionTable, Signature, Value};
        use std::cell::Cell;
        use std::rc::Rc;

        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);
        let mut host = FunctionTable::new();
        host.register_scalar("block_size", NUM_ACCENTS, move |_| {
            counter.set(counter.get() + 1);
            7.0
        });
        let sig = Signature::new(
            vec![
                DataType::FloatArray,
                DataType::FloatArray,
                DataType::Double,
                DataType::Integer,
                DataType::Double,
            ],
            DataType::Boolean,
        );
        host.register("pass", sig, |_| Ok(Value::Boolean(true)));
        let synth = SynthParams::new(SynthSettings::default(), Arc::new(host)).unwrap();

        let mut config = PluggableConfig::new();
        config.push_text("data", "pass").push_text("static", "size");
        let mut binding = PluggableBinding::new("user_effect", config);
        binding
            .params
            .insert("size".into(), ControlSpec::Formula("block_size".into()));
        let template =
            PluggableTemplate::new(&binding, EffectRole::Track, &PluggableRegistry::new(), synth.host())
                .unwrap();
        let mut effect = PluggableEffect::new_track(&template, &AccentVec::ZERO, &synth).unwrap();
        assert_eq!(calls.get(), 1);

        let inputs = PluggableInputs {
            pitch_hz: 0.0,
            loudness: 1.0,
            accents: &AccentVec::ZERO,
        };
        for _ in 0..3 {
            effect.update(&inputs, synth.host()).unwrap();
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(effect.values(), [7.0]);
    }

    #[test]
    fn param_def_constructors() {
        let d = PluggableParamDef::dynamic("cutoff", 1000.0);
        assert!(d.smoothed && d.kind == PluggableParamKind::Dynamic);
        let s = PluggableParamDef::fixed("size", 8.0);
        assert!(!s.smoothed && s.kind == PluggableParamKind::Static);
        assert_eq!(s.default, 8.0);
    }
}
