use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::matrix::DataMatrix;
use super::persist;
use crate::error::{Error, Result};

/// Feature streams keyed by label, then by stream id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRepository {
    streams: BTreeMap<String, BTreeMap<usize, DataMatrix>>,
    #[serde(default)]
    default_stream_id: usize,
}

impl DataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_stream(default_stream_id: usize) -> Self {
        Self {
            streams: BTreeMap::new(),
            default_stream_id,
        }
    }

    pub fn default_stream_id(&self) -> usize {
        self.default_stream_id
    }

    /// Load one matrix per label; labels starting with `_` are skipped.
    pub fn from_files(filenames: &BTreeMap<String, PathBuf>) -> Result<Self> {
        let mut repository = Self::new();
        for (label, path) in filenames {
            if label.starts_with('_') {
                continue;
            }
            let matrix = DataMatrix::load(path).map_err(|err| match err {
                Error::FileIo { path, source } => Error::FileIo {
                    source: std::io::Error::new(
                        source.kind(),
                        format!("stream [{}]: {}", label, source),
                    ),
                    path,
                },
                other => other,
            })?;
            debug!(label = %label, path = %path.display(), "loaded stream");
            let stream = repository.default_stream_id;
            repository.set_container(matrix, label, stream);
        }
        Ok(repository)
    }

    /// Sorted stream labels.
    pub fn labels(&self) -> Vec<&str> {
        self.streams.keys().map(String::as_str).collect()
    }

    pub fn stream_ids(&self, label: &str) -> Vec<usize> {
        self.streams
            .get(label)
            .map(|streams| streams.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.streams.contains_key(label)
    }

    pub fn get_container(&self, label: &str, stream: usize) -> Option<&DataMatrix> {
        self.streams.get(label).and_then(|s| s.get(&stream))
    }

    pub fn get_container_mut(&mut self, label: &str, stream: usize) -> Option<&mut DataMatrix> {
        self.streams.get_mut(label).and_then(|s| s.get_mut(&stream))
    }

    /// Like `get_container`, but a missing entry is a configuration error.
    pub fn require(&self, label: &str, stream: usize) -> Result<&DataMatrix> {
        let streams = self
            .streams
            .get(label)
            .ok_or_else(|| Error::config(format!("unknown stream label [{}]", label)))?;
        streams.get(&stream).ok_or_else(|| {
            Error::config(format!("stream [{}::{}] not in repository", label, stream))
        })
    }

    pub fn set_container(&mut self, container: DataMatrix, label: &str, stream: usize) {
        self.streams
            .entry(label.to_string())
            .or_default()
            .insert(stream, container);
    }

    /// Remove a whole label, or a single stream of it.
    pub fn remove(&mut self, label: &str, stream: Option<usize>) -> bool {
        match stream {
            None => self.streams.remove(label).is_some(),
            Some(id) => {
                let Some(streams) = self.streams.get_mut(label) else {
                    return false;
                };
                let removed = streams.remove(&id).is_some();
                if streams.is_empty() {
                    self.streams.remove(label);
                }
                removed
            }
        }
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Every `(label, stream, matrix)` in label then stream order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, &DataMatrix)> {
        self.streams.iter().flat_map(|(label, streams)| {
            streams
                .iter()
                .map(move |(id, matrix)| (label.as_str(), *id, matrix))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, usize, &mut DataMatrix)> {
        self.streams.iter_mut().flat_map(|(label, streams)| {
            streams
                .iter_mut()
                .map(move |(id, matrix)| (label.as_str(), *id, matrix))
        })
    }

    /// Write every stream as one JSON document; non-finite values are rejected.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<&Self> {
        for (label, stream, matrix) in self.iter() {
            persist::check_finite(matrix.data().iter(), &format!("stream [{}::{}]", label, stream))?;
        }
        persist::save_json(self, path)?;
        Ok(self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repository: DataRepository = persist::load_json(path)?;
        for (label, stream, matrix) in repository.iter() {
            if !(2..=3).contains(&matrix.ndim()) {
                return Err(Error::shape(format!(
                    "stream [{}::{}] has {} dimensions",
                    label,
                    stream,
                    matrix.ndim()
                )));
            }
            matrix.check_focus().map_err(|err| {
                Error::config(format!("stream [{}::{}]: {}", label, stream, err))
            })?;
        }
        Ok(repository)
    }
}
