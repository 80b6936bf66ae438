use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use ndarray::Array2;

use super::{frames_to_matrix, ExtractorParams, FeatureExtractor, Framing};
use crate::error::{Error, Result};

const EPSILON: f64 = 1e-10;

/// Mel band energies, optionally log-compressed.
#[derive(Debug, Clone)]
pub struct MelExtractor {
    params: ExtractorParams,
    framing: Framing,
}

impl MelExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self> {
        if params.n_mels == 0 {
            return Err(Error::config("n_mels must be positive"));
        }
        if params.fmin < 0.0 || params.fmin >= params.fmax() {
            return Err(Error::config(format!(
                "invalid mel range {} Hz - {} Hz",
                params.fmin,
                params.fmax()
            )));
        }
        let framing = params.framing()?;
        Ok(Self { params, framing })
    }

    /// Linear mel energies as `[frame][band]`.
    pub(crate) fn mel_frames(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let spectra = self
            .framing
            .spectrogram(samples, self.params.spectrogram_type);
        let freqs = spectrum::rfftfreq(self.params.n_fft, self.params.fs);
        let filterbank = MelFilterbank::new(
            self.params.fmin,
            self.params.fmax(),
            self.params.n_mels,
            &freqs,
            true,
        );
        analysis::mel::make_mel_spectrogram(&spectra, &filterbank)
    }
}

impl FeatureExtractor for MelExtractor {
    fn label(&self) -> &'static str {
        "mel"
    }

    fn params(&self) -> &ExtractorParams {
        &self.params
    }

    fn vector_length(&self) -> usize {
        self.params.n_mels
    }

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>> {
        let mel = frames_to_matrix(&self.mel_frames(samples), self.params.n_mels)?;
        if self.params.logarithmic {
            Ok(mel.mapv(|v| v.max(EPSILON).ln()))
        } else {
            Ok(mel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioData;

    fn tone(seconds: f64, fs: u32) -> Vec<f32> {
        let count = (seconds * fs as f64) as usize;
        (0..count)
            .map(|n| (2.0 * std::f64::consts::PI * 440.0 * n as f64 / fs as f64).sin() as f32 * 0.5)
            .collect()
    }

    #[test]
    fn two_seconds_give_forty_by_hundred_one() {
        let mel = MelExtractor::new(ExtractorParams::default()).unwrap();
        let audio = AudioData::mono(tone(2.0, 44_100), 44_100);
        let container = mel.extract_container(&audio).unwrap();
        assert_eq!(container.shape(), &[40, 101]);
        assert_eq!(container.time_resolution, Some(0.02));
        assert!(container.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn silence_is_floored_in_log_domain() {
        let mel = MelExtractor::new(ExtractorParams {
            fs: 16_000,
            n_fft: 1024,
            ..Default::default()
        })
        .unwrap();
        let matrix = mel.extract(&[0.0; 1_600]).unwrap();
        assert!(matrix.iter().all(|v| (*v - EPSILON.ln()).abs() < 1e-9));
    }

    #[test]
    fn rejects_empty_band_range() {
        let params = ExtractorParams {
            fmin: 30_000.0,
            ..Default::default()
        };
        assert!(MelExtractor::new(params).is_err());
    }
}
