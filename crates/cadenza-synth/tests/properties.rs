//! Property-based tests for cadenza-synth.
//!
//! Covers envelope timing and range, track sweeps, block clock drift,
//! waveform bounds, and filter stability using proptest for randomized
//! inputs.

use std::sync::Arc;

use cadenza_synth::{
    AccentVec, AlgorithmicShape, BlockClock, Command, EnvelopeParams, EnvelopePhase, EnvelopeSpec,
    EnvelopeState, EnvelopeTemplate, FunctionTable, IdealLowpass, IdealLowpassSpec,
    IncrParamUpdater, ResonantLowpass2, TrackParam,
};
use proptest::prelude::*;

const RATE: f64 = 100.0;

fn envelope(initial: f64, phases: &[(f64, f64)], host: &FunctionTable) -> EnvelopeState {
    let spec = EnvelopeSpec::with_phases(
        initial,
        phases
            .iter()
            .map(|&(seconds, endpoint)| EnvelopePhase::linear(seconds, endpoint))
            .collect(),
    );
    let template = Arc::new(EnvelopeTemplate::new(&spec, host).unwrap());
    let params = EnvelopeParams {
        accents: &AccentVec::ZERO,
        live_accents: &AccentVec::ZERO,
        pitch_hz: 440.0,
        loudness: 1.0,
        hurry_up: 1.0,
        envelope_rate: RATE,
    };
    EnvelopeState::new(&template, &params, host).unwrap().align(0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// An envelope finishes on exactly the tick its rounded phases add up
    /// to, never earlier.
    #[test]
    fn envelope_finishes_after_its_phase_ticks(
        phases in prop::collection::vec((0.0f64..0.5, -1.0f64..1.0), 0..6),
    ) {
        let host = FunctionTable::new();
        let mut env = envelope(0.0, &phases, &host);
        let total: u32 = env.phase_ticks().sum();
        prop_assert_eq!(env.is_at_end(), total == 0);
        for n in 1..=total + 5 {
            env.update(0.0, &host).unwrap();
            prop_assert_eq!(env.is_at_end(), n >= total, "tick {} of {}", n, total);
        }
    }

    /// Linear segments never leave the range spanned by their endpoints.
    #[test]
    fn linear_envelope_stays_between_endpoints(
        initial in -2.0f64..2.0,
        phases in prop::collection::vec((0.01f64..0.3, -2.0f64..2.0), 1..5),
    ) {
        let host = FunctionTable::new();
        let mut env = envelope(initial, &phases, &host);
        let lo = phases.iter().map(|p| p.1).fold(initial, f64::min) - 1e-9;
        let hi = phases.iter().map(|p| p.1).fold(initial, f64::max) + 1e-9;
        while !env.is_at_end() {
            let v = env.update(0.0, &host).unwrap();
            prop_assert!(v >= lo && v <= hi, "{} outside [{}, {}]", v, lo, hi);
        }
        prop_assert_eq!(env.value(), phases[phases.len() - 1].1);
    }

    /// A sweep lands on its target exactly, however the ticks are batched,
    /// and never overshoots on the way.
    #[test]
    fn sweeps_land_exactly(
        start in -10.0f64..10.0,
        target in -10.0f64..10.0,
        ticks in 1u32..500,
        batch in 1u32..50,
    ) {
        let mut track = IncrParamUpdater::new();
        track.apply(&Command::parse(&format!("set detune {start}")).unwrap());
        track.apply(&Command::parse(&format!("sweepto detune {target} {ticks}")).unwrap());
        let (lo, hi) = (start.min(target) - 1e-9, start.max(target) + 1e-9);
        let mut elapsed = 0;
        while elapsed < ticks {
            prop_assert!(track.is_sweeping());
            track.update(batch);
            elapsed += batch;
            let v = track.value(TrackParam::Detune);
            prop_assert!(v >= lo && v <= hi);
        }
        prop_assert!(!track.is_sweeping());
        prop_assert_eq!(track.value(TrackParam::Detune), target);
    }

    /// Per-tick block lengths never drift more than one base sample from
    /// the exact total.
    #[test]
    fn block_clock_does_not_drift(
        samples_per_tick in 1.0f64..2000.0,
        oversampling in 1usize..5,
        ticks in 1usize..400,
    ) {
        let mut clock = BlockClock::new(samples_per_tick, oversampling);
        let mut total = 0usize;
        for _ in 0..ticks {
            let len = clock.next_len();
            prop_assert_eq!(len % oversampling, 0);
            total += len;
        }
        let exact = samples_per_tick * ticks as f64 * oversampling as f64;
        prop_assert!((total as f64 - exact).abs() <= oversampling as f64, "{} vs {}", total, exact);
    }

    /// Every computed waveform stays within [-1, 1].
    #[test]
    fn algorithmic_shapes_are_bounded(phase in 0.0f64..1.0, width in 0.01f64..0.99) {
        for shape in [
            AlgorithmicShape::Sine,
            AlgorithmicShape::Triangle,
            AlgorithmicShape::Square,
            AlgorithmicShape::Ramp,
            AlgorithmicShape::Pulse,
        ] {
            let v = shape.value(phase, width);
            prop_assert!((-1.0..=1.0).contains(&v), "{:?} at {} = {}", shape, phase, v);
        }
    }

    /// Resonant lowpass cascades stay finite and decay after an impulse.
    #[test]
    fn resonant_lowpass2_is_stable(
        order in prop::sample::select(vec![2u32, 4, 6]),
        broken in any::<bool>(),
        cutoff_ratio in 0.001f64..0.45,
        resonance in 0.5f64..4.0,
    ) {
        let sample_rate = 48000.0;
        let mut filter = ResonantLowpass2::new(order, broken, sample_rate).unwrap();
        filter.set_params(cutoff_ratio * sample_rate, resonance);
        let mut input = vec![0.0f32; 2048];
        input[0] = 1.0;
        let mut output = vec![0.0f32; input.len()];
        filter.process_block(&input, &mut output);
        prop_assert!(output.iter().all(|x| x.is_finite()));
    }

    /// Enabled FIR lowpass designs have unity DC gain and symmetric taps.
    #[test]
    fn ideal_lowpass_taps_are_normalized(
        cutoff_ratio in 0.01f64..0.49,
        half_order in 1u32..40,
    ) {
        let sample_rate = 48000.0;
        let spec = IdealLowpassSpec {
            cutoff: cutoff_ratio * sample_rate,
            order: 2 * half_order + 1,
            min_sample_rate: 0.0,
        };
        let lp = IdealLowpass::new(&spec, sample_rate);
        prop_assert!(lp.is_enabled());
        let taps = lp.taps();
        let sum: f32 = taps.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-4, "dc gain {}", sum);
        for i in 0..taps.len() {
            prop_assert!((taps[i] - taps[taps.len() - 1 - i]).abs() < 1e-6);
        }
    }
}
