use crate::error::{Error, Result};
use crate::types::AudioData;
use std::path::Path;
use tracing::debug;

/// Write AudioData as 16-bit PCM WAV, interleaving channels
pub fn encode_audio<P: AsRef<Path>>(audio: &AudioData, path: P) -> Result<()> {
    let path = path.as_ref();
    let channel_count = audio.channel_count();
    if channel_count == 0 || channel_count > u16::MAX as usize {
        return Err(Error::Audio(format!(
            "cannot encode audio with {} channels",
            channel_count
        )));
    }

    let spec = hound::WavSpec {
        channels: channel_count as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // The writer owns the file handle and releases it on every exit path.
    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..audio.length() {
        for channel in &audio.channels {
            // Clamp to [-1.0, 1.0] and scale to i16 range
            let clamped = channel[i].clamp(-1.0, 1.0);
            writer.write_sample((clamped * 32767.0) as i16)?;
        }
    }
    writer.finalize()?;

    debug!(path = %path.display(), channels = channel_count, "wrote audio file");
    Ok(())
}
