use crate::containers::persist::file_io;
use crate::error::{Error, Result};
use crate::types::AudioData;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decode an audio file to per-channel f32 samples
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();

    let file = std::fs::File::open(path).map_err(file_io(path))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create hint from file extension
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let opened = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| audio_error(path, "unrecognised audio format", err))?;

    let mut format = opened.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Audio(format!("no audio tracks found in {}", path.display())))?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
        Error::Audio(format!(
            "sample rate not specified in audio file {}",
            path.display()
        ))
    })?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| audio_error(path, "failed to create decoder", err))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(audio_error(path, "failed to read packet", err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|err| audio_error(path, "failed to decode audio packet", err))?;

        let spec = *decoded.spec();
        let channel_count = spec.channels.count().max(1);
        if channels.is_empty() {
            channels = vec![Vec::new(); channel_count];
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        deinterleave_into(buffer.samples(), &mut channels);
    }

    if channels.is_empty() {
        channels.push(Vec::new());
    }

    Ok(AudioData {
        channels,
        sample_rate,
    })
}

fn deinterleave_into(interleaved: &[f32], channels: &mut [Vec<f32>]) {
    let count = channels.len();
    for frame in interleaved.chunks_exact(count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
}

fn audio_error(path: &Path, what: &str, err: SymphoniaError) -> Error {
    match err {
        SymphoniaError::IoError(io) => Error::Io(io),
        other => Error::Audio(format!("{}: {} ({})", path.display(), what, other)),
    }
}
