use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::containers::DataMatrix;
use crate::error::{Error, Result};
use crate::types::MetaData;

/// Target length in frames, given either directly or in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodeLength {
    Frames(usize),
    Seconds(f64),
}

fn check_label_list(label_list: &[String], encoder: &str) -> Result<()> {
    if label_list.is_empty() {
        return Err(Error::config(format!("{}: no label_list set", encoder)));
    }
    Ok(())
}

fn seconds_to_frames(seconds: f64, time_resolution: f64) -> usize {
    (seconds / time_resolution).ceil().max(0.0) as usize
}

fn check_resolution(time_resolution: f64) -> Result<()> {
    if time_resolution > 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!(
            "time resolution must be positive, got {}",
            time_resolution
        )))
    }
}

fn label_position(label_list: &[String], label: &str) -> Result<usize> {
    label_list
        .iter()
        .position(|known| known == label)
        .ok_or_else(|| Error::config(format!("label [{}] not in label list", label)))
}

/// Binary `(labels, frames)` matrix with a single active row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub label_list: Vec<String>,
    pub time_resolution: f64,
    pub length_frames: usize,
}

impl OneHotEncoder {
    pub fn new(label_list: Vec<String>, time_resolution: f64, length: EncodeLength) -> Result<Self> {
        check_label_list(&label_list, "OneHotEncoder")?;
        check_resolution(time_resolution)?;
        let length_frames = match length {
            EncodeLength::Frames(frames) => frames,
            EncodeLength::Seconds(seconds) => seconds_to_frames(seconds, time_resolution),
        };
        Ok(Self {
            label_list,
            time_resolution,
            length_frames,
        })
    }

    pub fn encode(&self, label: &str, length: Option<EncodeLength>) -> Result<DataMatrix> {
        self.encode_many(&[label], length)
    }

    fn encode_many(&self, labels: &[&str], length: Option<EncodeLength>) -> Result<DataMatrix> {
        let frames = match length {
            None => self.length_frames,
            Some(EncodeLength::Frames(frames)) => frames,
            Some(EncodeLength::Seconds(seconds)) => seconds_to_frames(seconds, self.time_resolution),
        };
        let mut matrix = Array2::zeros((self.label_list.len(), frames));
        for label in labels {
            let row = label_position(&self.label_list, label)?;
            matrix.row_mut(row).fill(1.0);
        }
        Ok(DataMatrix::from_2d(matrix, Some(self.time_resolution)))
    }
}

/// Binary `(labels, frames)` matrix with one active row per given label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManyHotEncoder {
    inner: OneHotEncoder,
}

impl ManyHotEncoder {
    pub fn new(label_list: Vec<String>, time_resolution: f64, length: EncodeLength) -> Result<Self> {
        check_label_list(&label_list, "ManyHotEncoder")?;
        Ok(Self {
            inner: OneHotEncoder::new(label_list, time_resolution, length)?,
        })
    }

    pub fn label_list(&self) -> &[String] {
        &self.inner.label_list
    }

    pub fn encode(&self, labels: &[&str], length: Option<EncodeLength>) -> Result<DataMatrix> {
        self.inner.encode_many(labels, length)
    }
}

fn default_label_field() -> String {
    "event_label".to_string()
}

/// Frame-level activity of timed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRollEncoder {
    pub label_list: Vec<String>,
    pub time_resolution: f64,
    #[serde(default = "default_label_field")]
    pub label_field: String,
}

impl EventRollEncoder {
    pub fn new(label_list: Vec<String>, time_resolution: f64) -> Result<Self> {
        check_label_list(&label_list, "EventRollEncoder")?;
        check_resolution(time_resolution)?;
        Ok(Self {
            label_list,
            time_resolution,
            label_field: default_label_field(),
        })
    }

    pub fn with_label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = field.into();
        self
    }

    /// Onsets round down and offsets round up to frames; events past the end are cut.
    /// Without a length the roll runs to the latest offset.
    pub fn encode(&self, metadata: &MetaData, length: Option<EncodeLength>) -> Result<DataMatrix> {
        let frames = match length {
            Some(EncodeLength::Frames(frames)) => frames,
            Some(EncodeLength::Seconds(seconds)) => seconds_to_frames(seconds, self.time_resolution),
            None => seconds_to_frames(metadata.max_offset(), self.time_resolution),
        };
        let mut roll = Array2::zeros((self.label_list.len(), frames));
        for item in &metadata.items {
            let (Some(onset), Some(offset)) = (item.onset, item.offset) else {
                continue;
            };
            let Some(label) = item.field(&self.label_field) else {
                continue;
            };
            let row = label_position(&self.label_list, label)?;
            let start = ((onset / self.time_resolution).floor().max(0.0) as usize).min(frames);
            let stop = seconds_to_frames(offset, self.time_resolution).min(frames);
            for frame in start..stop {
                roll[[row, frame]] = 1.0;
            }
        }
        Ok(DataMatrix::from_2d(roll, Some(self.time_resolution)))
    }
}
