//! Block-rate conversion between the processing rate and the base rate.
//!
//! Processors that opt out of oversampling run at the base rate inside an
//! oversampled engine. Their input is decimated by averaging each group of
//! `factor` samples, and their output is brought back up by linear
//! interpolation that carries the last sample across calls so block
//! boundaries stay continuous.

/// Averages each run of `factor` input samples into one output sample.
///
/// A short final run is averaged over the samples it has. Writes
/// `min(output.len(), input.len().div_ceil(factor))` samples.
pub fn downsample_average(input: &[f32], output: &mut [f32], factor: usize) {
    for (out, chunk) in output.iter_mut().zip(input.chunks(factor.max(1))) {
        *out = chunk.iter().sum::<f32>() / chunk.len() as f32;
    }
}

/// Linear-interpolating upsampler with one sample of memory.
#[derive(Debug, Clone, Default)]
pub struct Upsampler {
    last: f32,
}

impl Upsampler {
    /// Starts from silence.
    pub fn new() -> Self {
        Self { last: 0.0 }
    }

    /// Expands `input` by `factor` into `output`.
    ///
    /// Each input sample `x` produces `factor` samples ramping from the
    /// previous input sample up to `x`; the last of them is `x` itself.
    pub fn process(&mut self, input: &[f32], output: &mut [f32], factor: usize) {
        let factor = factor.max(1);
        let step = 1.0 / factor as f32;
        for (&x, chunk) in input.iter().zip(output.chunks_mut(factor)) {
            let prev = self.last;
            for (k, out) in chunk.iter_mut().enumerate() {
                *out = prev + (x - prev) * step * (k + 1) as f32;
            }
            if let Some(tail) = chunk.last_mut() {
                *tail = x;
            }
            self.last = x;
        }
    }

    /// Last input sample seen.
    pub fn last(&self) -> f32 {
        self.last
    }

    /// Forgets the carried sample.
    pub fn reset(&mut self) {
        self.last = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_groups() {
        let input = [1.0, 3.0, 2.0, 2.0, -1.0, 1.0];
        let mut output = [0.0; 3];
        downsample_average(&input, &mut output, 2);
        assert_eq!(output, [2.0, 2.0, 0.0]);
    }

    #[test]
    fn averages_a_short_final_group() {
        let input = [1.0, 3.0, 2.0, 4.0, 5.0];
        let mut output = [0.0; 3];
        downsample_average(&input, &mut output, 2);
        assert_eq!(output, [2.0, 3.0, 5.0]);
    }

    #[test]
    fn upsample_fills_a_short_final_group() {
        let mut up = Upsampler::new();
        let mut out = [9.0; 5];
        up.process(&[2.0, 4.0, 6.0], &mut out, 2);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 6.0]);
        assert_eq!(up.last(), 6.0);
    }

    #[test]
    fn upsample_carries_across_blocks() {
        let mut up = Upsampler::new();
        let mut out = [0.0; 4];
        up.process(&[1.0, 1.0], &mut out, 2);
        assert_eq!(out, [0.5, 1.0, 1.0, 1.0]);
        up.process(&[0.0, 0.0], &mut out, 2);
        assert_eq!(out, [0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn factor_one_is_copy() {
        let mut up = Upsampler::new();
        let mut out = [0.0; 3];
        up.process(&[0.1, 0.2, 0.3], &mut out, 1);
        assert_eq!(out, [0.1, 0.2, 0.3]);
    }
}
