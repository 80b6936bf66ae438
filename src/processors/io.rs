use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::registry::ProcessorRegistry;
use super::{parse_params, wrong_input, ChainData, ItemType, ProcessArgs, Processor};
use crate::containers::{persist, DataMatrix, DataRepository};
use crate::error::{Error, Result};
use crate::types::MetaData;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadingParams {
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WritingParams {
    pub output_filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stored {
    Matrix,
    Repository,
    Metadata,
}

impl Stored {
    fn item_type(self) -> ItemType {
        match self {
            Stored::Matrix => ItemType::DataMatrix,
            Stored::Repository => ItemType::DataRepository,
            Stored::Metadata => ItemType::MetaData,
        }
    }
}

/// Loads a persisted container; the file name comes from the call or the init parameters.
pub struct ReadingProcessor {
    name: &'static str,
    kind: Stored,
    params: ReadingParams,
}

impl Processor for ReadingProcessor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn input_type(&self) -> ItemType {
        ItemType::None
    }

    fn output_type(&self) -> ItemType {
        self.kind.item_type()
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["filename"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        if !matches!(data, ChainData::None) {
            return Err(wrong_input(self.name, ItemType::None, &data));
        }
        let path = args
            .get_path("filename")?
            .or_else(|| self.params.filename.clone())
            .ok_or_else(|| Error::config(format!("{}: no filename given", self.name)))?;
        let loaded = match self.kind {
            Stored::Matrix => ChainData::Matrix(DataMatrix::load(&path)?),
            Stored::Repository => ChainData::Repository(DataRepository::load(&path)?),
            Stored::Metadata => ChainData::Metadata(persist::load_json::<MetaData, _>(&path)?),
        };
        info!(path = %path.display(), loaded = %loaded.summary(), "read");
        Ok(loaded)
    }
}

/// Persists the incoming container and passes it on unchanged.
pub struct WritingProcessor {
    name: &'static str,
    kind: Stored,
    params: WritingParams,
}

impl Processor for WritingProcessor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn input_type(&self) -> ItemType {
        self.kind.item_type()
    }

    fn output_type(&self) -> ItemType {
        self.kind.item_type()
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["output_filename"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let path = args
            .get_path("output_filename")?
            .or_else(|| self.params.output_filename.clone())
            .ok_or_else(|| Error::config(format!("{}: no output_filename given", self.name)))?;
        match (&data, self.kind) {
            (ChainData::Matrix(matrix), Stored::Matrix) => {
                matrix.save(&path)?;
            }
            (ChainData::Repository(repository), Stored::Repository) => {
                repository.save(&path)?;
            }
            _ => return Err(wrong_input(self.name, self.kind.item_type(), &data)),
        }
        info!(path = %path.display(), "wrote {}", self.kind.item_type());
        Ok(data)
    }
}

fn reader(name: &'static str, kind: Stored, params: Value) -> Result<Box<dyn Processor>> {
    Ok(Box::new(ReadingProcessor {
        name,
        kind,
        params: parse_params(name, params)?,
    }))
}

fn writer(name: &'static str, kind: Stored, params: Value) -> Result<Box<dyn Processor>> {
    Ok(Box::new(WritingProcessor {
        name,
        kind,
        params: parse_params(name, params)?,
    }))
}

pub(crate) fn register(registry: &mut ProcessorRegistry) {
    registry.register("FeatureReadingProcessor", |params| {
        reader("FeatureReadingProcessor", Stored::Matrix, params)
    });
    registry.register("RepositoryFeatureReadingProcessor", |params| {
        reader("RepositoryFeatureReadingProcessor", Stored::Repository, params)
    });
    registry.register("MetadataReadingProcessor", |params| {
        reader("MetadataReadingProcessor", Stored::Metadata, params)
    });
    registry.register("FeatureWritingProcessor", |params| {
        writer("FeatureWritingProcessor", Stored::Matrix, params)
    });
    registry.register("RepositoryFeatureWritingProcessor", |params| {
        writer("RepositoryFeatureWritingProcessor", Stored::Repository, params)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use serde_json::json;

    fn path_arg(key: &str, path: &std::path::Path) -> ProcessArgs {
        ProcessArgs::new().with(key, path.to_string_lossy().to_string())
    }

    #[test]
    fn feature_writer_then_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mel.json");
        let matrix = DataMatrix::from_2d(Array2::from_elem((4, 6), 0.25), Some(0.02));

        let mut writer = writer("FeatureWritingProcessor", Stored::Matrix, Value::Null).unwrap();
        let passed = writer
            .process(ChainData::Matrix(matrix.clone()), &path_arg("output_filename", &path))
            .unwrap();
        assert_eq!(passed.as_matrix(), Some(&matrix));

        let mut reader = reader(
            "FeatureReadingProcessor",
            Stored::Matrix,
            json!({"filename": path}),
        )
        .unwrap();
        let loaded = reader.process(ChainData::None, &ProcessArgs::new()).unwrap();
        assert_eq!(loaded.as_matrix(), Some(&matrix));
    }

    #[test]
    fn writer_rejects_other_containers() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            writer("RepositoryFeatureWritingProcessor", Stored::Repository, Value::Null).unwrap();
        let matrix = DataMatrix::from_2d(Array2::zeros((1, 1)), None);
        let err = writer
            .process(
                ChainData::Matrix(matrix),
                &path_arg("output_filename", &dir.path().join("r.json")),
            )
            .unwrap_err();
        assert!(matches!(err, Error::WrongInput { .. }));
    }

    #[test]
    fn unsupported_extension_is_io_error() {
        let mut writer = writer("FeatureWritingProcessor", Stored::Matrix, Value::Null).unwrap();
        let matrix = DataMatrix::from_2d(Array2::zeros((1, 1)), None);
        let err = writer
            .process(
                ChainData::Matrix(matrix),
                &ProcessArgs::new().with("output_filename", "features.cpickle"),
            )
            .unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn metadata_reader_parses_event_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(
            &path,
            r#"[{"event_label": "dog", "onset": 0.5, "offset": 1.5}, {"event_label": "car", "onset": 1.0, "offset": 2.0}]"#,
        )
        .unwrap();
        let mut reader = reader("MetadataReadingProcessor", Stored::Metadata, Value::Null).unwrap();
        let ChainData::Metadata(metadata) = reader
            .process(ChainData::None, &path_arg("filename", &path))
            .unwrap()
        else {
            panic!("expected metadata");
        };
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata.max_offset(), 2.0);
    }
}
