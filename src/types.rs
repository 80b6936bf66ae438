//! Core value types passed between featflow processing stages

use serde::{Deserialize, Serialize};

/// Decoded audio, one sample vector per channel, normalized to [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub channels: Vec<Vec<f32>>,
    /// Sample rate in Hz (e.g., 44100)
    pub sample_rate: u32,
}

impl AudioData {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn length(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length() as f64 / self.sample_rate as f64
    }

    /// Average all channels into one.
    pub fn mixdown(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            count => (0..self.length())
                .map(|i| {
                    let sum: f32 = self.channels.iter().map(|ch| ch[i]).sum();
                    sum / count as f32
                })
                .collect(),
        }
    }

    pub fn into_mono(self) -> Self {
        if self.channels.len() <= 1 {
            return self;
        }
        let samples = self.mixdown();
        Self::mono(samples, self.sample_rate)
    }
}

/// One annotation row: a scene label, a tagged clip or a timed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaDataItem {
    pub filename: Option<String>,
    pub identifier: Option<String>,
    pub scene_label: Option<String>,
    pub event_label: Option<String>,
    pub source_label: Option<String>,
    /// Event onset in seconds
    pub onset: Option<f64>,
    /// Event offset in seconds
    pub offset: Option<f64>,
    pub tags: Vec<String>,
}

impl MetaDataItem {
    /// Look up a textual field by name, e.g. `"scene_label"`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "filename" => self.filename.as_deref(),
            "identifier" => self.identifier.as_deref(),
            "scene_label" => self.scene_label.as_deref(),
            "event_label" => self.event_label.as_deref(),
            "source_label" => self.source_label.as_deref(),
            _ => None,
        }
    }
}

/// Ordered annotation list for one recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaData {
    pub items: Vec<MetaDataItem>,
}

impl MetaData {
    pub fn new(items: Vec<MetaDataItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Latest event offset in seconds, 0.0 when no item carries one.
    pub fn max_offset(&self) -> f64 {
        self.items
            .iter()
            .filter_map(|item| item.offset)
            .fold(0.0, f64::max)
    }

    /// Distinct values of a field, in order of first appearance.
    pub fn unique_values(&self, field: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for value in self.items.iter().filter_map(|item| item.field(field)) {
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixdown_averages_channels() {
        let audio = AudioData {
            channels: vec![vec![1.0, 0.0, -1.0], vec![0.0, 0.0, 1.0]],
            sample_rate: 8_000,
        };
        assert_eq!(audio.mixdown(), vec![0.5, 0.0, 0.0]);
        let mono = audio.into_mono();
        assert_eq!(mono.channel_count(), 1);
        assert_eq!(mono.length(), 3);
    }

    #[test]
    fn metadata_max_offset_and_unique_labels() {
        let meta = MetaData::new(vec![
            MetaDataItem {
                event_label: Some("dog".into()),
                onset: Some(0.5),
                offset: Some(1.5),
                ..Default::default()
            },
            MetaDataItem {
                event_label: Some("car".into()),
                onset: Some(1.0),
                offset: Some(3.25),
                ..Default::default()
            },
            MetaDataItem {
                event_label: Some("dog".into()),
                onset: Some(2.0),
                offset: Some(2.5),
                ..Default::default()
            },
        ]);
        assert_eq!(meta.max_offset(), 3.25);
        assert_eq!(meta.unique_values("event_label"), vec!["dog", "car"]);
    }
}
