use ndarray::Array2;

use super::{ExtractorParams, FeatureExtractor, Framing};
use crate::error::Result;

/// Fraction of adjacent sample pairs that change sign, per frame.
#[derive(Debug, Clone)]
pub struct ZeroCrossingRateExtractor {
    params: ExtractorParams,
    framing: Framing,
}

impl ZeroCrossingRateExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self> {
        let framing = params.framing()?;
        Ok(Self { params, framing })
    }
}

impl FeatureExtractor for ZeroCrossingRateExtractor {
    fn label(&self) -> &'static str {
        "zcr"
    }

    fn params(&self) -> &ExtractorParams {
        &self.params
    }

    fn vector_length(&self) -> usize {
        1
    }

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>> {
        let frames = self.framing.time_frames(samples);
        let rates: Vec<f64> = frames
            .iter()
            .map(|frame| {
                let crossings = frame
                    .windows(2)
                    .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
                    .count();
                crossings as f64 / frame.len() as f64
            })
            .collect();
        Ok(Array2::from_shape_vec((1, rates.len()), rates)?)
    }
}

/// Root-mean-square energy per frame.
#[derive(Debug, Clone)]
pub struct RmsEnergyExtractor {
    params: ExtractorParams,
    framing: Framing,
}

impl RmsEnergyExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self> {
        let framing = params.framing()?;
        Ok(Self { params, framing })
    }
}

impl FeatureExtractor for RmsEnergyExtractor {
    fn label(&self) -> &'static str {
        "rmse"
    }

    fn params(&self) -> &ExtractorParams {
        &self.params
    }

    fn vector_length(&self) -> usize {
        1
    }

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>> {
        let energies: Vec<f64> = self
            .framing
            .time_frames(samples)
            .iter()
            .map(|frame| (frame.iter().map(|v| v * v).sum::<f64>() / frame.len() as f64).sqrt())
            .collect();
        Ok(Array2::from_shape_vec((1, energies.len()), energies)?)
    }
}
