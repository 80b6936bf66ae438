use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::registry::ProcessorRegistry;
use super::{parse_params, wrong_input, ChainData, ItemType, ProcessArgs, Processor};
use crate::audio::{self, encoder, LoadOptions};
use crate::error::{Error, Result};

const READING_KEYWORDS: &[&str] = &["filename", "focus_start_seconds", "focus_stop_seconds"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioReadingParams {
    /// Target sample rate; `null` keeps the file rate
    pub fs: Option<u32>,
    pub mono: bool,
    pub filename: Option<PathBuf>,
    pub focus_start_seconds: Option<f64>,
    pub focus_stop_seconds: Option<f64>,
}

impl Default for AudioReadingParams {
    fn default() -> Self {
        Self {
            fs: Some(44_100),
            mono: false,
            filename: None,
            focus_start_seconds: None,
            focus_stop_seconds: None,
        }
    }
}

/// Loads an audio file; the chain's first stage in most pipelines.
pub struct AudioReadingProcessor {
    name: &'static str,
    params: AudioReadingParams,
}

impl AudioReadingProcessor {
    pub fn new(params: AudioReadingParams) -> Self {
        Self {
            name: "AudioReadingProcessor",
            params,
        }
    }

    /// Variant that always mixes down to one channel.
    pub fn mono(mut params: AudioReadingParams) -> Self {
        params.mono = true;
        Self {
            name: "MonoAudioReadingProcessor",
            params,
        }
    }
}

impl Processor for AudioReadingProcessor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn input_type(&self) -> ItemType {
        ItemType::None
    }

    fn output_type(&self) -> ItemType {
        ItemType::Audio
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        READING_KEYWORDS
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        if !matches!(data, ChainData::None) {
            return Err(wrong_input(self.name, ItemType::None, &data));
        }
        let filename = args
            .get_path("filename")?
            .or_else(|| self.params.filename.clone())
            .ok_or_else(|| Error::config(format!("{}: no filename given", self.name)))?;
        let options = LoadOptions {
            mono: self.params.mono,
            fs: self.params.fs,
            start: args
                .get_f64("focus_start_seconds")?
                .or(self.params.focus_start_seconds),
            stop: args
                .get_f64("focus_stop_seconds")?
                .or(self.params.focus_stop_seconds),
        };
        let audio = audio::load(&filename, &options)?;
        info!(
            path = %filename.display(),
            channels = audio.channel_count(),
            sample_rate = audio.sample_rate,
            "read audio"
        );
        Ok(ChainData::Audio(audio))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioWritingParams {
    pub output_filename: Option<PathBuf>,
}

/// Writes audio to WAV and passes it on unchanged.
pub struct AudioWritingProcessor {
    params: AudioWritingParams,
}

impl AudioWritingProcessor {
    pub fn new(params: AudioWritingParams) -> Self {
        Self { params }
    }
}

impl Processor for AudioWritingProcessor {
    fn name(&self) -> &'static str {
        "AudioWritingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::Audio
    }

    fn output_type(&self) -> ItemType {
        ItemType::Audio
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["output_filename"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let ChainData::Audio(audio) = &data else {
            return Err(wrong_input(self.name(), ItemType::Audio, &data));
        };
        let path = args
            .get_path("output_filename")?
            .or_else(|| self.params.output_filename.clone())
            .ok_or_else(|| Error::config("AudioWritingProcessor: no output_filename given"))?;
        encoder::encode_audio(audio, &path)?;
        debug!(path = %path.display(), "audio written");
        Ok(data)
    }
}

/// Mixes audio down to one channel, writes it when a filename is known and
/// passes the mono signal on.
pub struct MonoAudioWritingProcessor {
    params: AudioWritingParams,
}

impl MonoAudioWritingProcessor {
    pub fn new(params: AudioWritingParams) -> Self {
        Self { params }
    }
}

impl Processor for MonoAudioWritingProcessor {
    fn name(&self) -> &'static str {
        "MonoAudioWritingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::Audio
    }

    fn output_type(&self) -> ItemType {
        ItemType::Audio
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["output_filename"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let audio = match data {
            ChainData::Audio(audio) => audio,
            other => return Err(wrong_input(self.name(), ItemType::Audio, &other)),
        };
        let mono = audio.into_mono();
        let path = args
            .get_path("output_filename")?
            .or_else(|| self.params.output_filename.clone());
        if let Some(path) = path {
            encoder::encode_audio(&mono, &path)?;
            debug!(path = %path.display(), "mono audio written");
        }
        Ok(ChainData::Audio(mono))
    }
}

pub(crate) fn register(registry: &mut ProcessorRegistry) {
    registry.register("AudioReadingProcessor", |params: Value| {
        let params = parse_params("AudioReadingProcessor", params)?;
        Ok(Box::new(AudioReadingProcessor::new(params)) as Box<dyn Processor>)
    });
    registry.register("MonoAudioReadingProcessor", |params: Value| {
        let params = parse_params("MonoAudioReadingProcessor", params)?;
        Ok(Box::new(AudioReadingProcessor::mono(params)) as Box<dyn Processor>)
    });
    registry.register("AudioWritingProcessor", |params: Value| {
        let params = parse_params("AudioWritingProcessor", params)?;
        Ok(Box::new(AudioWritingProcessor::new(params)) as Box<dyn Processor>)
    });
    registry.register("MonoAudioWritingProcessor", |params: Value| {
        let params = parse_params("MonoAudioWritingProcessor", params)?;
        Ok(Box::new(MonoAudioWritingProcessor::new(params)) as Box<dyn Processor>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioData;

    fn write_stereo(path: &std::path::Path) {
        let audio = AudioData {
            channels: vec![vec![0.5; 16_000], vec![-0.5; 16_000]],
            sample_rate: 16_000,
        };
        encoder::encode_audio(&audio, path).unwrap();
    }

    #[test]
    fn reads_file_named_in_call_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_stereo(&path);

        let mut reader = AudioReadingProcessor::new(AudioReadingParams {
            fs: None,
            ..Default::default()
        });
        let args = ProcessArgs::new().with("filename", path.to_string_lossy().to_string());
        let ChainData::Audio(audio) = reader.process(ChainData::None, &args).unwrap() else {
            panic!("expected audio");
        };
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.sample_rate, 16_000);
    }

    #[test]
    fn mono_reader_mixes_down_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_stereo(&path);

        let mut reader = AudioReadingProcessor::mono(AudioReadingParams {
            fs: Some(16_000),
            filename: Some(path),
            ..Default::default()
        });
        let args = ProcessArgs::new()
            .with("focus_start_seconds", 0.25)
            .with("focus_stop_seconds", 0.75);
        let ChainData::Audio(audio) = reader.process(ChainData::None, &args).unwrap() else {
            panic!("expected audio");
        };
        assert_eq!(audio.channel_count(), 1);
        assert_eq!(audio.length(), 8_000);
        assert!(audio.channels[0][10].abs() < 1e-3);
    }

    #[test]
    fn missing_filename_is_configuration_error() {
        let mut reader = AudioReadingProcessor::new(AudioReadingParams::default());
        let err = reader.process(ChainData::None, &ProcessArgs::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn writer_passes_audio_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut writer = AudioWritingProcessor::new(AudioWritingParams::default());
        let audio = ChainData::Audio(AudioData::mono(vec![0.1; 100], 8_000));
        let args = ProcessArgs::new().with("output_filename", path.to_string_lossy().to_string());
        let out = writer.process(audio.clone(), &args).unwrap();
        assert_eq!(out, audio);
        assert!(path.exists());
    }

    #[test]
    fn mono_writer_mixes_down_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let mut writer = ProcessorRegistry::with_builtins()
            .create(
                "MonoAudioWritingProcessor",
                serde_json::json!({"output_filename": path}),
            )
            .unwrap();
        let stereo = AudioData {
            channels: vec![vec![0.5; 800], vec![0.25; 800]],
            sample_rate: 8_000,
        };
        let ChainData::Audio(out) = writer
            .process(ChainData::Audio(stereo), &ProcessArgs::new())
            .unwrap()
        else {
            panic!("expected audio");
        };
        assert_eq!(out.channel_count(), 1);
        assert!((out.channels[0][0] - 0.375).abs() < 1e-6);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 800);
    }

    #[test]
    fn mono_writer_without_filename_only_mixes_down() {
        let mut writer = MonoAudioWritingProcessor::new(AudioWritingParams::default());
        let stereo = AudioData {
            channels: vec![vec![1.0; 4], vec![0.0; 4]],
            sample_rate: 8_000,
        };
        let out = writer
            .process(ChainData::Audio(stereo), &ProcessArgs::new())
            .unwrap();
        assert_eq!(out, ChainData::Audio(AudioData::mono(vec![0.5; 4], 8_000)));
    }
}
