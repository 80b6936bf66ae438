use std::f64::consts::PI;

use aus::{analysis, spectrum};
use ndarray::Array2;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use super::{ExtractorParams, FeatureExtractor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    #[default]
    HammingAsymmetric,
    HammingSymmetric,
    HannAsymmetric,
    HannSymmetric,
    Rectangular,
}

impl WindowType {
    /// Window coefficients; asymmetric windows are periodic (denominator `n`).
    pub fn coefficients(&self, length: usize) -> Vec<f64> {
        let denominator = match self {
            WindowType::HammingAsymmetric | WindowType::HannAsymmetric => length as f64,
            _ => (length.max(2) - 1) as f64,
        };
        (0..length)
            .map(|n| {
                let phase = 2.0 * PI * n as f64 / denominator;
                match self {
                    WindowType::HammingAsymmetric | WindowType::HammingSymmetric => {
                        0.54 - 0.46 * phase.cos()
                    }
                    WindowType::HannAsymmetric | WindowType::HannSymmetric => {
                        0.5 - 0.5 * phase.cos()
                    }
                    WindowType::Rectangular => 1.0,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrogramType {
    Magnitude,
    #[default]
    Power,
}

/// Framing of a signal into centered, windowed FFT frames.
///
/// Frame `t` is centered on sample `t * hop`; the signal is reflect-padded by
/// `n_fft / 2` on both sides (zero-padded when too short to reflect), which
/// gives `len / hop + 1` frames.
#[derive(Debug, Clone)]
pub struct Framing {
    pub win_length: usize,
    pub hop_length: usize,
    pub n_fft: usize,
    pub window: WindowType,
}

impl Framing {
    pub fn new(win_length: usize, hop_length: usize, n_fft: usize, window: WindowType) -> Result<Self> {
        if win_length == 0 || hop_length == 0 {
            return Err(Error::config("window and hop length must be positive"));
        }
        if n_fft < win_length {
            return Err(Error::config(format!(
                "n_fft ({}) shorter than window ({})",
                n_fft, win_length
            )));
        }
        Ok(Self {
            win_length,
            hop_length,
            n_fft,
            window,
        })
    }

    pub fn frame_count(&self, samples: usize) -> usize {
        samples / self.hop_length + 1
    }

    fn padded(&self, samples: &[f32]) -> Vec<f64> {
        let pad = self.n_fft / 2;
        let len = samples.len();
        let mut padded = Vec::with_capacity(len + 2 * pad);
        let reflect = len > pad;
        for i in (1..=pad).rev() {
            padded.push(if reflect { samples[i] as f64 } else { 0.0 });
        }
        padded.extend(samples.iter().map(|&s| s as f64));
        for i in 0..pad {
            padded.push(if reflect {
                samples[len - 2 - i] as f64
            } else {
                0.0
            });
        }
        padded
    }

    /// Per-frame spectra, `[frame][bin]` with `n_fft / 2 + 1` bins.
    pub fn spectrogram(&self, samples: &[f32], kind: SpectrogramType) -> Vec<Vec<f64>> {
        let padded = self.padded(samples);
        let frames = self.frame_count(samples.len());
        let offset = (self.n_fft - self.win_length) / 2;
        let window = self.window.coefficients(self.win_length);
        let fft = FftPlanner::<f64>::new().plan_fft_forward(self.n_fft);
        let bins = self.n_fft / 2 + 1;

        let mut buffer = vec![Complex64::new(0.0, 0.0); self.n_fft];
        let mut output = Vec::with_capacity(frames);
        for t in 0..frames {
            let start = t * self.hop_length;
            buffer.fill(Complex64::new(0.0, 0.0));
            for (n, w) in window.iter().enumerate() {
                let sample = padded.get(start + offset + n).copied().unwrap_or(0.0);
                buffer[offset + n] = Complex64::new(sample * w, 0.0);
            }
            fft.process(&mut buffer);
            output.push(
                buffer[..bins]
                    .iter()
                    .map(|c| match kind {
                        SpectrogramType::Magnitude => c.norm(),
                        SpectrogramType::Power => c.norm_sqr(),
                    })
                    .collect(),
            );
        }
        output
    }

    /// Centered time-domain frames of `win_length` samples, zero outside the signal.
    pub fn time_frames(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let half = (self.win_length / 2) as isize;
        (0..self.frame_count(samples.len()))
            .map(|t| {
                let center = (t * self.hop_length) as isize;
                (0..self.win_length as isize)
                    .map(|n| {
                        let idx = center - half + n;
                        if idx < 0 {
                            0.0
                        } else {
                            samples.get(idx as usize).map_or(0.0, |&s| s as f64)
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// Magnitude-weighted mean frequency per frame, in Hz.
///
/// Always works on the magnitude spectrogram; silent frames give 0.
#[derive(Debug, Clone)]
pub struct SpectralCentroidExtractor {
    params: ExtractorParams,
    framing: Framing,
    freqs: Vec<f64>,
}

impl SpectralCentroidExtractor {
    pub fn new(params: ExtractorParams) -> Result<Self> {
        let framing = params.framing()?;
        let freqs = spectrum::rfftfreq(params.n_fft, params.fs);
        Ok(Self {
            params,
            framing,
            freqs,
        })
    }
}

impl FeatureExtractor for SpectralCentroidExtractor {
    fn label(&self) -> &'static str {
        "spectral_centroid"
    }

    fn params(&self) -> &ExtractorParams {
        &self.params
    }

    fn vector_length(&self) -> usize {
        1
    }

    fn extract(&self, samples: &[f32]) -> Result<Array2<f64>> {
        let centroids: Vec<f64> = self
            .framing
            .spectrogram(samples, SpectrogramType::Magnitude)
            .iter()
            .map(|frame| {
                if frame.iter().sum::<f64>() > 0.0 {
                    analysis::spectral_centroid(frame, &self.freqs)
                } else {
                    0.0
                }
            })
            .collect();
        Ok(Array2::from_shape_vec((1, centroids.len()), centroids)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn symmetric_hann_reaches_zero_at_both_ends() {
        let window = WindowType::HannSymmetric.coefficients(5);
        assert_abs_diff_eq!(window[0], 0.0);
        assert_abs_diff_eq!(window[4], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(window[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn frame_count_matches_centered_framing() {
        let framing = Framing::new(1764, 882, 2048, WindowType::HammingAsymmetric).unwrap();
        assert_eq!(framing.frame_count(88_200), 101);
    }

    #[test]
    fn sine_peaks_in_expected_bin() {
        let fs = 8_000.0;
        let samples: Vec<f32> = (0..4_000)
            .map(|n| (2.0 * std::f64::consts::PI * 1_000.0 * n as f64 / fs).sin() as f32)
            .collect();
        let framing = Framing::new(256, 128, 256, WindowType::HannAsymmetric).unwrap();
        let spectra = framing.spectrogram(&samples, SpectrogramType::Power);
        assert_eq!(spectra.len(), 4_000 / 128 + 1);
        let middle = &spectra[spectra.len() / 2];
        assert_eq!(middle.len(), 129);
        let peak = middle
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap();
        // 1 kHz at 8 kHz / 256 points
        assert_eq!(peak, 32);
    }

    #[test]
    fn short_signals_fall_back_to_zero_padding() {
        let framing = Framing::new(8, 4, 16, WindowType::Rectangular).unwrap();
        let spectra = framing.spectrogram(&[1.0; 5], SpectrogramType::Magnitude);
        assert_eq!(spectra.len(), 2);
    }

    #[test]
    fn time_frames_are_centered() {
        let framing = Framing::new(4, 2, 4, WindowType::Rectangular).unwrap();
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        let frames = framing.time_frames(&samples);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(frames[1], vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn rejects_window_longer_than_fft() {
        assert!(Framing::new(4096, 512, 2048, WindowType::Rectangular).is_err());
    }

    #[test]
    fn centroid_follows_a_pure_tone() {
        let params = ExtractorParams {
            fs: 8_000,
            win_length_samples: Some(256),
            hop_length_samples: Some(128),
            n_fft: 256,
            window_type: WindowType::HannAsymmetric,
            ..Default::default()
        };
        let samples: Vec<f32> = (0..4_000)
            .map(|n| (2.0 * PI * 1_000.0 * n as f64 / 8_000.0).sin() as f32)
            .collect();
        let centroid = SpectralCentroidExtractor::new(params).unwrap();
        let out = centroid.extract(&samples).unwrap();
        assert_eq!(out.shape(), &[1, 32]);
        // hann leakage is symmetric around the 1 kHz bin
        assert_abs_diff_eq!(out[[0, 16]], 1_000.0, epsilon = 1.0);
    }

    #[test]
    fn silent_frames_have_zero_centroid() {
        let params = ExtractorParams {
            fs: 8_000,
            win_length_samples: Some(64),
            hop_length_samples: Some(32),
            n_fft: 64,
            ..Default::default()
        };
        let out = SpectralCentroidExtractor::new(params)
            .unwrap()
            .extract(&[0.0; 320])
            .unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
