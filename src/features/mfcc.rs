use aus::analysis;
use ndarray::{s, Array1, Array2, Axis};

use super::mel::MelExtractor;
use super::{frames_to_matrix, ExtractorParams, FeatureExtractor};
use crate::error::{Error, Result};

const EPSILON: f64 = 1e-12;

/// Static cepstral coefficients from the mel energies.
#[derive(Debug, Clone)]
pub struct MfccStaticExtractor {
    mel: MelExtractor,
}

impl MfccStaticExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self> {
        if params.n_mfcc == 0 || (params.omit_zeroth && params.n_mfcc == 1) {
            return Err(Error::config("n_mfcc leaves no coefficients"));
        }
        if params.n_mfcc > params.n_mels {
            return Err(Error::config(format!(
                "n_mfcc ({}) exceeds n_mels ({})",
                params.n_mfcc, params.n_mels
            )));
        }
        Ok(Self {
            mel: MelExtractor::new(params)?,
        })
    }

    fn coefficients(&self, samples: &[f32]) -> Result<Array2<f64>> {
        let params = self.mel.params();
        let mel = self.mel.mel_frames(samples);
        let mfcc = analysis::mel::mfcc_spectrogram(&mel, params.n_mfcc, None);
        let matrix = frames_to_matrix(&mfcc, params.n_mfcc)?;
        if params.omit_zeroth {
            Ok(matrix.slice(s![1.., ..]).to_owned())
        } else {
            Ok(matrix)
        }
    }
}

impl FeatureExtractor for MfccStaticExtractor {
    fn label(&self) -> &'static str {
        "mfcc"
    }

    fn params(&self) -> &ExtractorParams {
        self.mel.params()
    }

    fn vector_length(&self) -> usize {
        let params = self.mel.params();
        params.n_mfcc - usize::from(params.omit_zeroth)
    }

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>> {
        self.coefficients(samples)
    }
}

/// First-order regression over time of the static coefficients.
#[derive(Debug, Clone)]
pub struct MfccDeltaExtractor {
    base: MfccStaticExtractor,
}

impl MfccDeltaExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self> {
        check_width(&params)?;
        Ok(Self {
            base: MfccStaticExtractor::new(params)?,
        })
    }
}

impl FeatureExtractor for MfccDeltaExtractor {
    fn label(&self) -> &'static str {
        "mfcc_delta"
    }

    fn params(&self) -> &ExtractorParams {
        self.base.params()
    }

    fn vector_length(&self) -> usize {
        self.base.vector_length()
    }

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>> {
        let mfcc = self.base.extract(samples)?;
        Ok(delta(&mfcc, self.params().width / 2))
    }
}

/// Second-order regression (delta of delta) of the static coefficients.
#[derive(Debug, Clone)]
pub struct MfccAccelerationExtractor {
    base: MfccStaticExtractor,
}

impl MfccAccelerationExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self> {
        check_width(&params)?;
        Ok(Self {
            base: MfccStaticExtractor::new(params)?,
        })
    }
}

impl FeatureExtractor for MfccAccelerationExtractor {
    fn label(&self) -> &'static str {
        "mfcc_acceleration"
    }

    fn params(&self) -> &ExtractorParams {
        self.base.params()
    }

    fn vector_length(&self) -> usize {
        self.base.vector_length()
    }

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>> {
        let mfcc = self.base.extract(samples)?;
        let window = self.params().width / 2;
        Ok(delta(&delta(&mfcc, window), window))
    }
}

fn check_width(params: &ExtractorParams) -> Result<()> {
    if params.width < 3 {
        return Err(Error::config(format!(
            "delta width must be at least 3, got {}",
            params.width
        )));
    }
    Ok(())
}

/// Regression delta along the frame axis, edge frames clamped.
pub(crate) fn delta(input: &Array2<f64>, window: usize) -> Array2<f64> {
    let (coeffs, frames) = input.dim();
    let mut output = Array2::zeros((coeffs, frames));
    if frames == 0 {
        return output;
    }
    let denominator = (2.0 * (1..=window).map(|n| (n * n) as f64).sum::<f64>()).max(EPSILON);

    for t in 0..frames {
        let mut numerator = Array1::zeros(coeffs);
        for n in 1..=window {
            let prev = input.index_axis(Axis(1), t.saturating_sub(n));
            let next = input.index_axis(Axis(1), (t + n).min(frames - 1));
            numerator += &((&next - &prev) * n as f64);
        }
        output.column_mut(t).assign(&(numerator / denominator));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioData;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn noise(count: usize) -> Vec<f32> {
        let mut state = 12_345_u32;
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((state >> 16) as f32 / 32_768.0) - 1.0
            })
            .collect()
    }

    #[test]
    fn delta_of_linear_ramp_is_constant_inside() {
        let ramp = array![[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]];
        let d = delta(&ramp, 2);
        assert_abs_diff_eq!(d[[0, 3]], 1.0, epsilon = 1e-12);
        // clamped edges see a flatter slope
        assert!(d[[0, 0]] < 1.0);
    }

    #[test]
    fn delta_of_constant_is_zero() {
        let d = delta(&Array2::from_elem((3, 10), 7.0), 4);
        assert!(d.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn mfcc_family_shares_shape() {
        let params = ExtractorParams {
            fs: 16_000,
            n_fft: 1024,
            ..Default::default()
        };
        let audio = AudioData::mono(noise(16_000), 16_000);
        let extractors: Vec<Box<dyn FeatureExtractor>> = vec![
            Box::new(MfccStaticExtractor::new(params.clone()).unwrap()),
            Box::new(MfccDeltaExtractor::new(params.clone()).unwrap()),
            Box::new(MfccAccelerationExtractor::new(params).unwrap()),
        ];
        for extractor in extractors {
            let container = extractor.extract_container(&audio).unwrap();
            // 16000 / 320 + 1 frames
            assert_eq!(container.shape(), &[20, 51], "{}", extractor.label());
        }
    }

    #[test]
    fn omit_zeroth_drops_first_coefficient() {
        let params = ExtractorParams {
            fs: 16_000,
            n_fft: 1024,
            n_mfcc: 13,
            omit_zeroth: true,
            ..Default::default()
        };
        let extractor = MfccStaticExtractor::new(params).unwrap();
        assert_eq!(extractor.vector_length(), 12);
        assert_eq!(extractor.extract(&noise(8_000)).unwrap().nrows(), 12);
    }

    #[test]
    fn rejects_too_many_coefficients() {
        let params = ExtractorParams {
            n_mfcc: 60,
            ..Default::default()
        };
        assert!(MfccStaticExtractor::new(params).is_err());
    }
}
