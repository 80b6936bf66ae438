//! Processing chain engine and built-in processors
//!
//! A [`Processor`] wraps one named transform behind a uniform
//! `process(data, args) -> data` contract. Processors are created by name
//! through a [`ProcessorRegistry`] and threaded together by a
//! [`ProcessingChain`].

pub mod audio;
pub mod chain;
pub mod data;
pub mod encoders;
pub mod features;
pub mod io;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::containers::{DataMatrix, DataRepository};
use crate::error::{Error, Result};
use crate::types::{AudioData, MetaData};

pub use chain::{ChainState, ProcessingChain};
pub use registry::{ProcessorFactory, ProcessorRegistry};

/// Kind of value a processor consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    None,
    Audio,
    DataMatrix,
    DataRepository,
    MetaData,
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemType::None => "none",
            ItemType::Audio => "audio",
            ItemType::DataMatrix => "data_matrix",
            ItemType::DataRepository => "data_repository",
            ItemType::MetaData => "metadata",
        };
        f.write_str(name)
    }
}

/// Value threaded from stage to stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainData {
    None,
    Audio(AudioData),
    Matrix(DataMatrix),
    Repository(DataRepository),
    Metadata(MetaData),
}

impl ChainData {
    pub fn item_type(&self) -> ItemType {
        match self {
            ChainData::None => ItemType::None,
            ChainData::Audio(_) => ItemType::Audio,
            ChainData::Matrix(_) => ItemType::DataMatrix,
            ChainData::Repository(_) => ItemType::DataRepository,
            ChainData::Metadata(_) => ItemType::MetaData,
        }
    }

    pub fn as_matrix(&self) -> Option<&DataMatrix> {
        match self {
            ChainData::Matrix(matrix) => Some(matrix),
            _ => None,
        }
    }

    pub fn as_repository(&self) -> Option<&DataRepository> {
        match self {
            ChainData::Repository(repository) => Some(repository),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioData> {
        match self {
            ChainData::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    /// Short human readable description, e.g. `data_matrix [40, 101]`.
    pub fn summary(&self) -> String {
        match self {
            ChainData::None => "none".to_string(),
            ChainData::Audio(audio) => format!(
                "audio {} ch x {} samples @ {} Hz",
                audio.channel_count(),
                audio.length(),
                audio.sample_rate
            ),
            ChainData::Matrix(matrix) => format!("data_matrix {:?}", matrix.shape()),
            ChainData::Repository(repository) => {
                let streams: Vec<String> = repository
                    .iter()
                    .map(|(label, stream, matrix)| {
                        format!("{}::{} {:?}", label, stream, matrix.shape())
                    })
                    .collect();
                format!("data_repository [{}]", streams.join(", "))
            }
            ChainData::Metadata(metadata) => format!("metadata {} items", metadata.len()),
        }
    }
}

/// Keyword arguments for one `process` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessArgs(BTreeMap<String, Value>);

impl ProcessArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Typed lookup; a present but mistyped value is a configuration error.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| Error::config(format!("argument [{}]: {}", key, err))),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        self.get_as(key)
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.get_as(key)
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get_as(key)
    }

    pub fn get_path(&self, key: &str) -> Result<Option<PathBuf>> {
        self.get_as(key)
    }

    /// `self` layered over `defaults`; keys in `self` win.
    pub fn merged_over(&self, defaults: &Map<String, Value>) -> ProcessArgs {
        let mut merged: BTreeMap<String, Value> = defaults
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        merged.extend(self.0.iter().map(|(key, value)| (key.clone(), value.clone())));
        ProcessArgs(merged)
    }

    /// Only the keys in `accepted`.
    pub fn filtered(&self, accepted: &[&str]) -> ProcessArgs {
        ProcessArgs(
            self.0
                .iter()
                .filter(|(key, _)| accepted.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for ProcessArgs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        ProcessArgs(iter.into_iter().collect())
    }
}

/// One chain stage: a named transform with optional persistent state.
///
/// Instances are not shared across threads; run one chain per worker.
pub trait Processor {
    /// Registry name, e.g. `"MelExtractorProcessor"`.
    fn name(&self) -> &'static str;

    fn input_type(&self) -> ItemType;

    fn output_type(&self) -> ItemType;

    /// Keywords this processor reads from call arguments.
    fn accepted_keywords(&self) -> &'static [&'static str] {
        &[]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData>;

    /// Serializable state, `None` for stateless processors.
    fn state(&self) -> Result<Option<Value>> {
        Ok(None)
    }

    fn load_state(&mut self, _state: Value) -> Result<()> {
        Err(Error::config(format!("{} holds no state", self.name())))
    }

    /// Run a named method; `false` when the processor does not know it.
    fn command(&mut self, _method: &str, _args: &ProcessArgs) -> Result<bool> {
        Ok(false)
    }
}

pub(crate) fn wrong_input(processor: &str, expected: ItemType, actual: &ChainData) -> Error {
    Error::WrongInput {
        processor: processor.to_string(),
        expected: expected.to_string(),
        actual: actual.item_type().to_string(),
    }
}

/// Deserialize `init_parameters`; `null` means all defaults.
pub(crate) fn parse_params<T: DeserializeOwned>(processor: &str, params: Value) -> Result<T> {
    let params = if params.is_null() {
        Value::Object(Map::new())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|err| Error::config(format!("{}: invalid init parameters: {}", processor, err)))
}
