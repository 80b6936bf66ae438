//! Error types shared by every featflow module

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for featflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid recipe, parameters, processor names or chain wiring.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O failure on a named file.
    #[error("IO error on {path:?}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file that could not be written or read as JSON.
    #[error("JSON error in {path:?}: {source}")]
    FileFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported file format for {path:?}, expected one of {expected:?}")]
    UnsupportedFormat {
        path: PathBuf,
        expected: &'static [&'static str],
    },

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{processor}: wrong input data type, expected {expected}, got {actual}")]
    WrongInput {
        processor: String,
        expected: String,
        actual: String,
    },

    /// A chain stage failed; carries the stage position and name.
    #[error("Processing chain failed at stage {position} [{name}]: {source}")]
    Stage {
        position: usize,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Error::Shape(message.into())
    }

    /// True when the error (or the stage error it wraps) is an I/O failure.
    pub fn is_io(&self) -> bool {
        match self {
            Error::Io(_) | Error::FileIo { .. } | Error::UnsupportedFormat { .. } => true,
            Error::Stage { source, .. } => source.is_io(),
            _ => false,
        }
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => Error::Io(io),
            other => Error::Audio(other.to_string()),
        }
    }
}

/// Result type for featflow operations.
pub type Result<T> = std::result::Result<T, Error>;
