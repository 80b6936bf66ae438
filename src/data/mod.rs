//! Transforms over feature containers: stacking, aggregation, sequencing,
//! normalization, event masking and label encoding

pub mod aggregator;
pub mod encoders;
pub mod masker;
pub mod normalizer;
pub mod sequencer;
pub mod stacker;

pub use aggregator::{AggregationMethod, Aggregator, AggregatorParams};
pub use encoders::{EncodeLength, EventRollEncoder, ManyHotEncoder, OneHotEncoder};
pub use masker::{Masker, Selector};
pub use normalizer::{Normalizer, RepositoryNormalizer};
pub use sequencer::{Sequencer, SequencerParams, ShiftBorder};
pub use stacker::Stacker;
