use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::registry::ProcessorRegistry;
use super::{parse_params, wrong_input, ChainData, ItemType, ProcessArgs, Processor};
use crate::data::{
    Aggregator, AggregatorParams, Masker, Normalizer, RepositoryNormalizer, Sequencer,
    SequencerParams, Stacker,
};
use crate::error::{Error, Result};
use crate::recipe::Recipe;
use crate::types::MetaData;

pub struct AggregationProcessor {
    aggregator: Aggregator,
}

impl Processor for AggregationProcessor {
    fn name(&self) -> &'static str {
        "AggregationProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn process(&mut self, data: ChainData, _args: &ProcessArgs) -> Result<ChainData> {
        match data {
            ChainData::Matrix(matrix) => Ok(ChainData::Matrix(self.aggregator.aggregate(&matrix)?)),
            other => Err(wrong_input(self.name(), ItemType::DataMatrix, &other)),
        }
    }
}

/// Sequencing stage; its running shift is the stage state.
pub struct SequencingProcessor {
    sequencer: Sequencer,
}

/// Runtime part of a sequencing stage. Parameters always come from the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SequencingState {
    shift: usize,
}

impl Processor for SequencingProcessor {
    fn name(&self) -> &'static str {
        "SequencingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn process(&mut self, data: ChainData, _args: &ProcessArgs) -> Result<ChainData> {
        match data {
            ChainData::Matrix(matrix) => Ok(ChainData::Matrix(self.sequencer.sequence(&matrix)?)),
            other => Err(wrong_input(self.name(), ItemType::DataMatrix, &other)),
        }
    }

    fn state(&self) -> Result<Option<Value>> {
        let state = SequencingState {
            shift: self.sequencer.shift(),
        };
        Ok(Some(serde_json::to_value(state)?))
    }

    fn load_state(&mut self, state: Value) -> Result<()> {
        let state: SequencingState = serde_json::from_value(state)
            .map_err(|err| Error::config(format!("SequencingProcessor state: {}", err)))?;
        self.sequencer.set_shift(state.shift);
        Ok(())
    }

    fn command(&mut self, method: &str, args: &ProcessArgs) -> Result<bool> {
        match method {
            "increase_shifting" => {
                self.sequencer.increase_shifting(args.get_usize("step")?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationParams {
    /// Saved [`Normalizer`] to start from
    pub filename: Option<PathBuf>,
    pub mean: Option<Vec<f64>>,
    pub std: Option<Vec<f64>>,
}

pub struct NormalizationProcessor {
    normalizer: Normalizer,
}

impl NormalizationProcessor {
    pub fn new(params: NormalizationParams) -> Result<Self> {
        let normalizer = match (params.filename, params.mean, params.std) {
            (Some(path), None, None) => {
                let normalizer = Normalizer::load(&path)?;
                if normalizer.mean().is_none() {
                    return Err(Error::config(format!(
                        "NormalizationProcessor: {} holds no finalized statistics",
                        path.display()
                    )));
                }
                normalizer
            }
            (None, Some(mean), Some(std)) => {
                Normalizer::from_stats(Array1::from_vec(mean), Array1::from_vec(std))?
            }
            (None, None, None) => {
                return Err(Error::config(
                    "NormalizationProcessor: statistics required, give filename or mean and std",
                ))
            }
            _ => {
                return Err(Error::config(
                    "NormalizationProcessor: give either filename or both mean and std",
                ))
            }
        };
        Ok(Self { normalizer })
    }
}

impl Processor for NormalizationProcessor {
    fn name(&self) -> &'static str {
        "NormalizationProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn process(&mut self, data: ChainData, _args: &ProcessArgs) -> Result<ChainData> {
        match data {
            ChainData::Matrix(matrix) => Ok(ChainData::Matrix(self.normalizer.normalize(matrix)?)),
            other => Err(wrong_input(self.name(), ItemType::DataMatrix, &other)),
        }
    }

    fn state(&self) -> Result<Option<Value>> {
        Ok(Some(serde_json::to_value(&self.normalizer)?))
    }

    fn load_state(&mut self, state: Value) -> Result<()> {
        self.normalizer = serde_json::from_value(state)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryNormalizationParams {
    /// Saved [`RepositoryNormalizer`]
    pub filename: Option<PathBuf>,
    /// Saved [`Normalizer`] per stream label
    pub filenames: BTreeMap<String, PathBuf>,
}

pub struct RepositoryNormalizationProcessor {
    normalizer: RepositoryNormalizer,
}

impl RepositoryNormalizationProcessor {
    pub fn new(params: RepositoryNormalizationParams) -> Result<Self> {
        let mut normalizer = match params.filename {
            Some(path) => RepositoryNormalizer::load(path)?,
            None => RepositoryNormalizer::new(),
        };
        normalizer.extend(RepositoryNormalizer::from_files(&params.filenames)?);
        Ok(Self { normalizer })
    }
}

impl Processor for RepositoryNormalizationProcessor {
    fn name(&self) -> &'static str {
        "RepositoryNormalizationProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::DataRepository
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataRepository
    }

    fn process(&mut self, data: ChainData, _args: &ProcessArgs) -> Result<ChainData> {
        match data {
            ChainData::Repository(repository) => Ok(ChainData::Repository(
                self.normalizer.normalize(repository)?,
            )),
            other => Err(wrong_input(self.name(), ItemType::DataRepository, &other)),
        }
    }

    fn state(&self) -> Result<Option<Value>> {
        Ok(Some(serde_json::to_value(&self.normalizer)?))
    }

    fn load_state(&mut self, state: Value) -> Result<()> {
        self.normalizer = serde_json::from_value(state)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryMaskingParams {
    /// Events masked when the call gives none
    pub mask_events: MetaData,
}

/// Removes frames covered by timed events from every repository stream.
pub struct RepositoryMaskingProcessor {
    masker: Masker,
}

impl RepositoryMaskingProcessor {
    pub fn new(params: RepositoryMaskingParams) -> Self {
        Self {
            masker: Masker::new(params.mask_events),
        }
    }
}

impl Processor for RepositoryMaskingProcessor {
    fn name(&self) -> &'static str {
        "RepositoryMaskingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::DataRepository
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataRepository
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["mask_events"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let repository = match data {
            ChainData::Repository(repository) => repository,
            other => return Err(wrong_input(self.name(), ItemType::DataRepository, &other)),
        };
        let events: Option<MetaData> = args.get_as("mask_events")?;
        Ok(ChainData::Repository(
            self.masker.mask(repository, events.as_ref())?,
        ))
    }
}

fn default_hop() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackingParams {
    pub recipe: Recipe,
    #[serde(default = "default_hop")]
    pub hop: usize,
}

pub struct StackingProcessor {
    stacker: Stacker,
}

impl Processor for StackingProcessor {
    fn name(&self) -> &'static str {
        "StackingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::DataRepository
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn process(&mut self, data: ChainData, _args: &ProcessArgs) -> Result<ChainData> {
        match data {
            ChainData::Repository(repository) => {
                let stacked = self.stacker.stack(&repository)?;
                debug!(recipe = %self.stacker.recipe(), shape = ?stacked.shape(), "stacked");
                Ok(ChainData::Matrix(stacked))
            }
            other => Err(wrong_input(self.name(), ItemType::DataRepository, &other)),
        }
    }
}

pub(crate) fn register(registry: &mut ProcessorRegistry) {
    registry.register("AggregationProcessor", |params: Value| {
        let params: AggregatorParams = parse_params("AggregationProcessor", params)?;
        Ok(Box::new(AggregationProcessor {
            aggregator: Aggregator::new(params)?,
        }) as Box<dyn Processor>)
    });
    registry.register("SequencingProcessor", |params: Value| {
        let params: SequencerParams = parse_params("SequencingProcessor", params)?;
        Ok(Box::new(SequencingProcessor {
            sequencer: Sequencer::new(params)?,
        }) as Box<dyn Processor>)
    });
    registry.register("NormalizationProcessor", |params: Value| {
        let params = parse_params("NormalizationProcessor", params)?;
        Ok(Box::new(NormalizationProcessor::new(params)?) as Box<dyn Processor>)
    });
    registry.register("RepositoryNormalizationProcessor", |params: Value| {
        let params = parse_params("RepositoryNormalizationProcessor", params)?;
        Ok(Box::new(RepositoryNormalizationProcessor::new(params)?) as Box<dyn Processor>)
    });
    registry.register("RepositoryMaskingProcessor", |params: Value| {
        let params = parse_params("RepositoryMaskingProcessor", params)?;
        Ok(Box::new(RepositoryMaskingProcessor::new(params)) as Box<dyn Processor>)
    });
    registry.register("StackingProcessor", |params: Value| {
        let params: StackingParams = parse_params("StackingProcessor", params)?;
        Ok(Box::new(StackingProcessor {
            stacker: Stacker::with_hop(params.recipe, params.hop)?,
        }) as Box<dyn Processor>)
    });
}
