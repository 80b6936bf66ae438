//! Audio loading collaborator: decode, trim, mix down and resample

pub mod decoder;
pub mod encoder;
pub mod resample;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::AudioData;

/// How an audio file should be brought into the chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Average all channels into one
    pub mono: bool,
    /// Target sample rate; `None` keeps the file rate
    pub fs: Option<u32>,
    /// Segment start in seconds
    pub start: Option<f64>,
    /// Segment stop in seconds
    pub stop: Option<f64>,
}

/// Load `path` according to `options`.
pub fn load<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<AudioData> {
    let path = path.as_ref();
    let decoded = decoder::decode_audio(path)?;
    debug!(
        path = %path.display(),
        sample_rate = decoded.sample_rate,
        channels = decoded.channel_count(),
        samples = decoded.length(),
        "decoded audio"
    );

    let trimmed = trim_audio_segment(decoded, options.start, options.stop)?;
    let audio = if options.mono {
        trimmed.into_mono()
    } else {
        trimmed
    };

    match options.fs {
        Some(fs) if fs != audio.sample_rate => {
            let resampler = resample::LinearResampler::new(audio.sample_rate, fs)?;
            Ok(AudioData {
                channels: resampler.process_channels(&audio.channels),
                sample_rate: resampler.target_rate(),
            })
        }
        _ => Ok(audio),
    }
}

fn trim_audio_segment(
    audio: AudioData,
    start_seconds: Option<f64>,
    stop_seconds: Option<f64>,
) -> Result<AudioData> {
    if start_seconds.is_none() && stop_seconds.is_none() {
        return Ok(audio);
    }
    let start = start_seconds.unwrap_or(0.0);
    let stop = stop_seconds.unwrap_or_else(|| audio.duration_seconds());
    if start < 0.0 || stop <= start {
        return Err(Error::config(format!(
            "invalid audio segment {:.3}s - {:.3}s",
            start, stop
        )));
    }

    let sr = audio.sample_rate as f64;
    let total_samples = audio.length();
    let start_index = ((start * sr).floor() as usize).min(total_samples);
    let stop_index = ((stop * sr).ceil() as usize).clamp(start_index, total_samples);

    let channels = audio
        .channels
        .into_iter()
        .map(|channel| channel[start_index..stop_index].to_vec())
        .collect();
    Ok(AudioData {
        channels,
        sample_rate: audio.sample_rate,
    })
}
