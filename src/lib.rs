//! featflow: feature extraction and processing chains for audio pattern
//! recognition experiments.
//!
//! Audio is turned into [`DataMatrix`] feature containers, grouped into
//! [`DataRepository`] streams, and then reshaped by stacking, aggregation,
//! sequencing and normalization. A [`ProcessingChain`] threads these steps
//! together from a JSON stage list.

pub mod audio;
pub mod config;
pub mod containers;
pub mod data;
pub mod error;
pub mod features;
pub mod processors;
pub mod recipe;
pub mod types;

pub use config::{ChainSpec, StageSpec};
pub use containers::{DataMatrix, DataRepository, FocusSpec};
pub use error::{Error, Result};
pub use processors::{ChainData, ItemType, ProcessArgs, ProcessingChain, Processor};
pub use recipe::Recipe;
pub use types::{AudioData, MetaData, MetaDataItem};
