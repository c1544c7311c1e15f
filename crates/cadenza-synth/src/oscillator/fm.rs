//! Two-operator sine FM oscillator.

use core::f64::consts::TAU;

use cadenza_core::Fixed64;

use super::OscCommon;

/// Two-operator sine FM: `sin(2π(φc + I·sin(2π·φm)))`, where `I` is the
/// index envelope in cycles of carrier deviation.
#[derive(Debug)]
pub struct FmOscillator {
    carrier_ratio: f64,
    modulator_ratio: f64,
    sample_rate: f64,
    carrier: Fixed64,
    modulator: Fixed64,
    carrier_increment: Fixed64,
    modulator_increment: Fixed64,
}

impl FmOscillator {
    pub(super) fn new(carrier_ratio: f64, modulator_ratio: f64, sample_rate: f64) -> Self {
        Self {
            carrier_ratio,
            modulator_ratio,
            sample_rate,
            carrier: Fixed64::ZERO,
            modulator: Fixed64::ZERO,
            carrier_increment: Fixed64::ZERO,
            modulator_increment: Fixed64::ZERO,
        }
    }

    pub(super) fn update(&mut self, common: &OscCommon) {
        let cycles = common.pitch_hz() / self.sample_rate;
        self.carrier_increment = Fixed64::from_f64(cycles * self.carrier_ratio).fraction_only();
        self.modulator_increment = Fixed64::from_f64(cycles * self.modulator_ratio).fraction_only();
    }

    pub(super) fn generate(&mut self, common: &OscCommon, out: &mut [f32]) {
        let index = common.index();
        for x in out.iter_mut() {
            let modulation = index * libm::sin(TAU * self.modulator.frac_f64());
            *x = libm::sin(TAU * (self.carrier.frac_f64() + modulation)) as f32;
            self.carrier = (self.carrier + self.carrier_increment).fraction_only();
            self.modulator = (self.modulator + self.modulator_increment).fraction_only();
        }
    }
}
