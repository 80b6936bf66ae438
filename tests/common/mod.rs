use std::f32::consts::PI;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

pub const SAMPLE_RATE: u32 = 44_100;

pub fn sine_wave(frequency: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let total = (seconds * sample_rate as f32) as usize;
    (0..total)
        .map(|n| 0.5 * (2.0 * PI * frequency * n as f32 / sample_rate as f32).sin())
        .collect()
}

/// Writes a 16-bit WAV with one channel per entry of `channels`.
pub fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav fixture");
    for frame in 0..channels[0].len() {
        for channel in channels {
            let sample = (channel[frame].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(sample).expect("write wav sample");
        }
    }
    writer.finalize().expect("finalize wav fixture");
}

/// Two second 440 Hz mono clip at 44.1 kHz.
pub fn two_second_clip(path: &Path) {
    write_wav(path, &[sine_wave(440.0, 2.0, SAMPLE_RATE)], SAMPLE_RATE);
}
