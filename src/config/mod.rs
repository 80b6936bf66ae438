//! Declarative chain specifications and reproducible parameter hashing

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::containers::persist;
use crate::error::{Error, Result};

/// One `{processor_name, init_parameters, process_parameters}` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageSpec {
    pub processor_name: String,
    #[serde(default)]
    pub init_parameters: Value,
    /// Keyword defaults for every `process` call; call arguments win
    #[serde(default)]
    pub process_parameters: Map<String, Value>,
}

impl StageSpec {
    pub fn new(processor_name: impl Into<String>) -> Self {
        Self {
            processor_name: processor_name.into(),
            init_parameters: Value::Null,
            process_parameters: Map::new(),
        }
    }

    pub fn with_init(mut self, init_parameters: Value) -> Self {
        self.init_parameters = init_parameters;
        self
    }

    pub fn with_process_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.process_parameters.insert(key.into(), value.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChainSpecRepr {
    Wrapped { chain: Vec<StageSpec> },
    Bare(Vec<StageSpec>),
}

/// Ordered stage list, read from `{"chain": [...]}` or a bare JSON list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChainSpecRepr")]
pub struct ChainSpec {
    pub chain: Vec<StageSpec>,
}

impl From<ChainSpecRepr> for ChainSpec {
    fn from(repr: ChainSpecRepr) -> Self {
        match repr {
            ChainSpecRepr::Wrapped { chain } | ChainSpecRepr::Bare(chain) => ChainSpec { chain },
        }
    }
}

impl ChainSpec {
    pub fn new(chain: Vec<StageSpec>) -> Self {
        Self { chain }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path).map_err(persist::file_io(path))?);
        serde_json::from_reader(reader).map_err(|err| {
            Error::config(format!(
                "invalid chain specification {}: {}",
                path.display(),
                err
            ))
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| Error::config(format!("invalid chain specification: {}", err)))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn hash(&self) -> String {
        let stages = self
            .chain
            .iter()
            .map(|stage| serde_json::to_value(stage).unwrap_or(Value::Null))
            .collect();
        parameter_hash(&Value::Array(stages))
    }
}

/// Keys never taken into account when hashing.
const NON_HASHED_KEYS: &[&str] = &["_hash", "verbose"];

/// Normalize a parameter tree so that equivalent settings hash identically.
///
/// `false` flags and bookkeeping keys are dropped, and a block switched off
/// with `enable: false` collapses to just that flag.
pub fn clean_for_hashing(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.get("enable") == Some(&Value::Bool(false)) {
                let mut disabled = Map::new();
                disabled.insert("enable".to_string(), Value::Bool(false));
                return Value::Object(disabled);
            }
            let cleaned = map
                .iter()
                .filter(|(key, value)| {
                    !NON_HASHED_KEYS.contains(&key.as_str()) && **value != Value::Bool(false)
                })
                .map(|(key, value)| (key.clone(), clean_for_hashing(value)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(clean_for_hashing).collect()),
        other => other.clone(),
    }
}

/// SHA-256 hex digest of the cleaned, key-sorted JSON form of `value`.
pub fn parameter_hash(value: &Value) -> String {
    // serde_json maps are ordered by key, so serialization is canonical.
    let canonical = clean_for_hashing(value).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_wrapped_and_bare_lists() {
        let wrapped = ChainSpec::from_json_str(
            r#"{"chain": [{"processor_name": "MonoAudioReadingProcessor", "init_parameters": {"fs": 44100}}]}"#,
        )
        .unwrap();
        let bare = ChainSpec::from_json_str(
            r#"[{"processor_name": "MonoAudioReadingProcessor", "init_parameters": {"fs": 44100}}]"#,
        )
        .unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.len(), 1);
        assert!(wrapped.chain[0].process_parameters.is_empty());
    }

    #[test]
    fn rejects_misspelled_stage_keys() {
        let err = ChainSpec::from_json_str(r#"[{"processor": "MelExtractorProcessor"}]"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn hash_ignores_key_order_and_bookkeeping() {
        let a = json!({"fs": 44100, "n_mels": 40, "verbose": true});
        let b = json!({"n_mels": 40, "fs": 44100, "_hash": "stale"});
        assert_eq!(parameter_hash(&a), parameter_hash(&b));
        assert_eq!(parameter_hash(&a).len(), 64);
    }

    #[test]
    fn hash_drops_false_flags_and_disabled_blocks() {
        let a = json!({"mono": false, "aggregation": {"enable": false, "win_length_frames": 10}});
        let b = json!({"aggregation": {"enable": false, "win_length_frames": 20}});
        assert_eq!(parameter_hash(&a), parameter_hash(&b));

        let c = json!({"aggregation": {"enable": true, "win_length_frames": 20}});
        assert_ne!(parameter_hash(&b), parameter_hash(&c));
    }

    #[test]
    fn chain_hash_follows_stage_content() {
        let first = ChainSpec::new(vec![StageSpec::new("MelExtractorProcessor")
            .with_init(json!({"n_mels": 40}))]);
        let second = ChainSpec::new(vec![StageSpec::new("MelExtractorProcessor")
            .with_init(json!({"n_mels": 64}))]);
        assert_eq!(first.hash(), first.clone().hash());
        assert_ne!(first.hash(), second.hash());
    }

    #[test]
    fn load_errors_name_the_chain_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent_chain.json");
        let err = ChainSpec::load(&missing).unwrap_err();
        assert!(matches!(err, Error::FileIo { .. }));
        assert!(err.to_string().contains("absent_chain.json"));

        let broken = dir.path().join("broken_chain.json");
        std::fs::write(&broken, "{\"chain\": [").unwrap();
        let err = ChainSpec::load(&broken).unwrap_err();
        assert!(err.to_string().contains("broken_chain.json"));
    }
}
