//! Default spectral feature backend
//!
//! Extractors turn mono samples into a `[feature, frame]` matrix whose frames
//! are `hop_length_seconds` apart. The numerical details live behind
//! [`FeatureExtractor`] so other backends can be swapped in.

pub mod mel;
pub mod mfcc;
pub mod spectral;
pub mod temporal;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::containers::DataMatrix;
use crate::error::{Error, Result};
use crate::types::AudioData;

pub use mel::MelExtractor;
pub use mfcc::{MfccAccelerationExtractor, MfccDeltaExtractor, MfccStaticExtractor};
pub use spectral::{Framing, SpectralCentroidExtractor, SpectrogramType, WindowType};
pub use temporal::{RmsEnergyExtractor, ZeroCrossingRateExtractor};

/// Shared extractor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorParams {
    pub fs: u32,
    pub win_length_seconds: f64,
    pub hop_length_seconds: f64,
    /// Overrides `win_length_seconds` when set
    pub win_length_samples: Option<usize>,
    /// Overrides `hop_length_seconds` when set
    pub hop_length_samples: Option<usize>,
    pub n_fft: usize,
    pub window_type: WindowType,
    pub spectrogram_type: SpectrogramType,
    pub n_mels: usize,
    pub fmin: f64,
    /// Defaults to `fs / 2`
    pub fmax: Option<f64>,
    /// Natural log of the mel energies
    pub logarithmic: bool,
    pub n_mfcc: usize,
    /// Drop the 0th cepstral coefficient
    pub omit_zeroth: bool,
    /// Regression width for delta features, in frames
    pub width: usize,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            fs: 44_100,
            win_length_seconds: 0.04,
            hop_length_seconds: 0.02,
            win_length_samples: None,
            hop_length_samples: None,
            n_fft: 2048,
            window_type: WindowType::HammingAsymmetric,
            spectrogram_type: SpectrogramType::Power,
            n_mels: 40,
            fmin: 0.0,
            fmax: None,
            logarithmic: true,
            n_mfcc: 20,
            omit_zeroth: false,
            width: 9,
        }
    }
}

impl ExtractorParams {
    pub fn win_length(&self) -> usize {
        self.win_length_samples
            .unwrap_or_else(|| (self.win_length_seconds * self.fs as f64).round() as usize)
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length_samples
            .unwrap_or_else(|| (self.hop_length_seconds * self.fs as f64).round() as usize)
    }

    /// Seconds between consecutive output frames.
    pub fn time_resolution(&self) -> f64 {
        self.hop_length() as f64 / self.fs as f64
    }

    pub fn fmax(&self) -> f64 {
        self.fmax.unwrap_or(self.fs as f64 / 2.0)
    }

    pub fn framing(&self) -> Result<Framing> {
        if self.fs == 0 {
            return Err(Error::config("sample rate must be positive"));
        }
        Framing::new(self.win_length(), self.hop_length(), self.n_fft, self.window_type)
    }
}

/// A spectral backend: samples in, `[feature, frame]` matrix out.
pub trait FeatureExtractor {
    /// Default stream label, e.g. `"mel"`.
    fn label(&self) -> &'static str;

    fn params(&self) -> &ExtractorParams;

    /// Rows the extractor produces per frame.
    fn vector_length(&self) -> usize;

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>>;

    /// Extract from audio at the configured rate, mixing multichannel input down.
    fn extract_container(&self, audio: &AudioData) -> Result<DataMatrix> {
        check_sample_rate(self.params(), audio)?;
        let data = if audio.channel_count() == 1 {
            self.extract(&audio.channels[0])?
        } else {
            self.extract(&audio.mixdown())?
        };
        Ok(DataMatrix::from_2d(data, Some(self.params().time_resolution())))
    }
}

pub(crate) fn check_sample_rate(params: &ExtractorParams, audio: &AudioData) -> Result<()> {
    if audio.sample_rate != params.fs {
        return Err(Error::config(format!(
            "extractor expects {} Hz audio, got {} Hz",
            params.fs, audio.sample_rate
        )));
    }
    if audio.channel_count() == 0 {
        return Err(Error::Audio("audio has no channels".to_string()));
    }
    Ok(())
}

/// Build the extractor registered for a repository stream label.
pub fn extractor_for_label(label: &str, params: ExtractorParams) -> Result<Box<dyn FeatureExtractor>> {
    let extractor: Box<dyn FeatureExtractor> = match label {
        "mel" => Box::new(MelExtractor::new(params)?),
        "mfcc" => Box::new(MfccStaticExtractor::new(params)?),
        "mfcc_delta" => Box::new(MfccDeltaExtractor::new(params)?),
        "mfcc_acceleration" => Box::new(MfccAccelerationExtractor::new(params)?),
        "zcr" => Box::new(ZeroCrossingRateExtractor::new(params)?),
        "rmse" => Box::new(RmsEnergyExtractor::new(params)?),
        "spectral_centroid" => Box::new(SpectralCentroidExtractor::new(params)?),
        other => {
            return Err(Error::config(format!(
                "no feature extractor for stream label [{}]",
                other
            )))
        }
    };
    Ok(extractor)
}

/// `[frame][feature]` rows into a `[feature, frame]` matrix.
pub(crate) fn frames_to_matrix(frames: &[Vec<f64>], rows: usize) -> Result<Array2<f64>> {
    if let Some(bad) = frames.iter().find(|frame| frame.len() != rows) {
        return Err(Error::shape(format!(
            "backend returned a frame with {} values, expected {}",
            bad.len(),
            rows
        )));
    }
    Ok(Array2::from_shape_fn((rows, frames.len()), |(r, t)| frames[t][r]))
}
