use crate::error::{Error, Result};

/// Linear-interpolation sample rate converter used by [`super::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearResampler {
    source_rate: u32,
    target_rate: u32,
}

impl LinearResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(Error::config(format!(
                "sample rates must be positive (got {} -> {})",
                source_rate, target_rate
            )));
        }
        Ok(Self {
            source_rate,
            target_rate,
        })
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Number of output samples produced for `input_len` input samples.
    pub fn output_length(&self, input_len: usize) -> usize {
        if input_len == 0 {
            return 0;
        }
        let scaled = input_len as u64 * self.target_rate as u64;
        let rate = self.source_rate as u64;
        (scaled.div_ceil(rate) as usize).max(1)
    }

    pub fn process(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() || self.source_rate == self.target_rate {
            return samples.to_vec();
        }
        let step = self.source_rate as f64 / self.target_rate as f64;
        let last = samples.len() - 1;
        (0..self.output_length(samples.len()))
            .map(|i| {
                let position = i as f64 * step;
                let left = (position.floor() as usize).min(last);
                let right = (left + 1).min(last);
                let weight = (position - left as f64).clamp(0.0, 1.0) as f32;
                samples[left] + (samples[right] - samples[left]) * weight
            })
            .collect()
    }

    /// Resample every channel independently; channel count is kept.
    pub fn process_channels(&self, channels: &[Vec<f32>]) -> Vec<Vec<f32>> {
        channels.iter().map(|channel| self.process(channel)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::LinearResampler;

    #[test]
    fn constant_signal_stays_constant() {
        let resampler = LinearResampler::new(48_000, 16_000).unwrap();
        let out = resampler.process(&vec![0.5; 480]);
        assert_eq!(out.len(), 160);
        assert!(out.iter().all(|&sample| (sample - 0.5).abs() < 1e-6));
    }

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        let resampler = LinearResampler::new(1, 2).unwrap();
        let out = resampler.process(&[0.0, 1.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn output_length_rounds_up() {
        let resampler = LinearResampler::new(44_100, 16_000).unwrap();
        assert_eq!(resampler.output_length(0), 0);
        assert_eq!(resampler.output_length(1), 1);
        assert_eq!(resampler.output_length(44_100), 16_000);
        assert_eq!(resampler.output_length(44_101), 16_001);
    }

    #[test]
    fn channels_are_resampled_independently() {
        let resampler = LinearResampler::new(2, 1).unwrap();
        let out = resampler.process_channels(&[vec![1.0; 4], vec![0.0, 2.0, 4.0, 6.0]]);
        assert_eq!(out, vec![vec![1.0, 1.0], vec![0.0, 4.0]]);
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(LinearResampler::new(0, 16_000).is_err());
        assert!(LinearResampler::new(16_000, 0).is_err());
    }
}
