//! Native tanh saturator exposed through the pluggable interface.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc, vec, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::{RampMode, fill_ramp};
use libm::tanhf;

use super::{
    ConfigKeyDef, ConfigValueType, PluggableConfig, PluggableParamDef, PluggableProcessor,
    PluggableProcessorFactory, PluggableProcessorTemplate,
};
use crate::context::SynthParams;
use crate::effect::EffectRole;
use crate::error::Result;
use crate::formula::FormulaHost;

const KEYS: &[ConfigKeyDef] = &[
    ConfigKeyDef {
        name: "drive",
        value_type: ConfigValueType::Number,
        min_count: 0,
        max_count: 1,
    },
    ConfigKeyDef {
        name: "level",
        value_type: ConfigValueType::Number,
        min_count: 0,
        max_count: 1,
    },
];

/// Factory for `"soft_clip"`: `level · tanh(drive · x) / tanh(drive)`.
///
/// Parameters `drive` and `level` are smoothed per sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftClipFactory;

impl PluggableProcessorFactory for SoftClipFactory {
    fn name(&self) -> &'static str {
        "soft_clip"
    }

    fn description(&self) -> &'static str {
        "Unity-gain tanh saturation"
    }

    fn config_keys(&self) -> &'static [ConfigKeyDef] {
        KEYS
    }

    fn create_template(
        &self,
        config: &PluggableConfig,
        _role: EffectRole,
    ) -> Result<Arc<dyn PluggableProcessorTemplate>> {
        Ok(Arc::new(SoftClipTemplate {
            defs: vec![
                PluggableParamDef::dynamic("drive", config.number("drive").unwrap_or(1.0)),
                PluggableParamDef::dynamic("level", config.number("level").unwrap_or(1.0)),
            ],
        }))
    }
}

#[derive(Debug)]
struct SoftClipTemplate {
    defs: Vec<PluggableParamDef>,
}

impl PluggableProcessorTemplate for SoftClipTemplate {
    fn param_defs(&self) -> &[PluggableParamDef] {
        &self.defs
    }

    fn check_unreferenced_objects(&self, _host: &dyn FormulaHost) -> Result<()> {
        Ok(())
    }

    fn create(&self, _synth: &SynthParams, static_values: &[f64]) -> Result<Box<dyn PluggableProcessor>> {
        let drive = static_values.first().copied().unwrap_or(1.0);
        let level = static_values.get(1).copied().unwrap_or(1.0);
        Ok(Box::new(SoftClip {
            drive: [drive; 2],
            level: [level; 2],
        }))
    }
}

/// `[previous, current]` pairs.
#[derive(Debug)]
struct SoftClip {
    drive: [f64; 2],
    level: [f64; 2],
}

impl PluggableProcessor for SoftClip {
    fn update_params(&mut self, values: &[f64]) {
        if let [drive, level, ..] = values {
            self.drive = [self.drive[1], drive.max(1e-3)];
            self.level = [self.level[1], *level];
        }
    }

    fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        let len = left.len().min(right.len());
        let mut drive = synth.acquire(len)?;
        let mut level = synth.acquire(len)?;
        fill_ramp(&mut drive, self.drive[0], self.drive[1], RampMode::Additive);
        fill_ramp(&mut level, self.level[0], self.level[1], RampMode::Additive);
        for channel in [&mut left[..len], &mut right[..len]] {
            for ((x, &d), &g) in channel.iter_mut().zip(drive.iter()).zip(level.iter()) {
                *x = g * tanhf(d * *x) / tanhf(d);
            }
        }
        self.drive[0] = self.drive[1];
        self.level[0] = self.level[1];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SynthSettings;
    use crate::formula::FunctionTable;

    #[test]
    fn saturates_and_preserves_small_signal_slope() {
        let synth = SynthParams::new(SynthSettings::default(), Arc::new(FunctionTable::new())).unwrap();
        let template = SoftClipFactory
            .create_template(&PluggableConfig::new(), EffectRole::Track)
            .unwrap();
        let mut clip = template.create(&synth, &[4.0, 1.0]).unwrap();
        clip.update_params(&[4.0, 1.0]);
        let mut left = vec![10.0f32, -10.0, 0.0];
        let mut right = vec![0.001f32; 3];
        clip.apply(&mut left, &mut right, &synth).unwrap();
        assert!((left[0] - 1.0).abs() < 1e-3);
        assert!((left[1] + 1.0).abs() < 1e-3);
        assert_eq!(left[2], 0.0);
        let slope = 4.0 / libm::tanhf(4.0);
        assert!((right[0] - 0.001 * slope).abs() < 1e-5);
    }
}
