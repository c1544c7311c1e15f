//! Wave-table oscillator with per-range table selection.

#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::Fixed64;

use super::OscCommon;
use crate::wavetable::{MultiWaveTable, WaveTable};

/// Plays a looped wave table, picking the pitch range's table every tick and
/// crossfading between frames by the index.
#[derive(Debug)]
pub struct WaveTableOscillator {
    tables: Arc<MultiWaveTable>,
    table: Option<Arc<WaveTable>>,
    multisample_ratio: f64,
    sample_rate: f64,
    phase: Fixed64,
    increment: Fixed64,
    frame: usize,
    weight: f32,
}

impl WaveTableOscillator {
    pub(super) fn new(
        tables: &Arc<MultiWaveTable>,
        multisample_ratio: f64,
        pitch_hz: f64,
        sample_rate: f64,
    ) -> Self {
        let multisample_ratio = if multisample_ratio.is_finite() { multisample_ratio } else { 1.0 };
        Self {
            tables: Arc::clone(tables),
            table: tables.select(pitch_hz * multisample_ratio).cloned(),
            multisample_ratio,
            sample_rate,
            phase: Fixed64::ZERO,
            increment: Fixed64::ZERO,
            frame: 0,
            weight: 0.0,
        }
    }

    pub(super) fn update(&mut self, common: &OscCommon) {
        let pitch = common.pitch_hz();
        self.table = self.tables.select(pitch * self.multisample_ratio).cloned();
        if let Some(table) = &self.table {
            (self.frame, self.weight) = table.blend(common.index());
            self.increment = Fixed64::from_f64(pitch * table.frame_len() as f64 / self.sample_rate);
        }
    }

    pub(super) fn generate(&mut self, out: &mut [f32]) {
        let Some(table) = &self.table else {
            return;
        };
        let len = table.frame_len() as u32;
        for x in out.iter_mut() {
            *x = table.sample_blended(self.frame, self.weight, self.phase);
            self.phase = (self.phase + self.increment).wrap_int(len);
        }
    }

    /// True when no table covers the current pitch.
    pub fn is_undefined(&self) -> bool {
        self.table.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{held, note, synth};
    use super::super::{OscillatorSource, OscillatorSpec, OscillatorTemplate};
    use crate::modulation::ModulatedSpec;
    use crate::pluggable::PluggableRegistry;
    use crate::wavetable::{MultiWaveTable, WaveLibrary, WaveTable};

    fn library() -> WaveLibrary {
        let mut low = MultiWaveTable::new();
        low.add(1000.0, WaveTable::single(vec![1.0, 1.0, -1.0, -1.0]).unwrap());
        let mut library = WaveLibrary::new();
        library.insert_wave_table("low", low);
        library.insert_wave_table(
            "morph",
            MultiWaveTable::single(WaveTable::new(vec![vec![0.0; 4], vec![1.0; 4]]).unwrap()),
        );
        library
    }

    #[test]
    fn index_crossfades_frames() {
        let synth = synth();
        let spec = OscillatorSpec {
            index: ModulatedSpec::constant(0.25),
            stereo_bias: -1.0,
            ..OscillatorSpec::new(OscillatorSource::WaveTable {
                table: "morph".into(),
            })
        };
        let template =
            OscillatorTemplate::new(&spec, &library(), &PluggableRegistry::new(), synth.host()).unwrap();
        let mut osc = template.instantiate(&note(69.0), &synth).unwrap().align(0);
        osc.update_envelopes(440.0, synth.host()).unwrap();
        let mut left = vec![0.0f32; 16];
        let mut right = vec![0.0f32; 16];
        osc.generate(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&x| (x - 0.25).abs() < 1e-6));
        assert!(right.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn pitch_outside_every_range_finishes_the_oscillator() {
        let synth = synth();
        let spec = OscillatorSpec {
            loudness: held(),
            ..OscillatorSpec::new(OscillatorSource::WaveTable { table: "low".into() })
        };
        let template =
            OscillatorTemplate::new(&spec, &library(), &PluggableRegistry::new(), synth.host()).unwrap();
        let mut osc = template.instantiate(&note(60.0), &synth).unwrap().align(0);
        osc.update_envelopes(440.0, synth.host()).unwrap();
        assert!(!osc.is_finished());
        osc.update_envelopes(2000.0, synth.host()).unwrap();
        assert!(osc.is_finished());
        let mut left = vec![0.0f32; 8];
        let mut right = vec![0.0f32; 8];
        osc.generate(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&x| x == 0.0));
    }
}
