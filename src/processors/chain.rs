use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use super::registry::ProcessorRegistry;
use super::{ChainData, ProcessArgs, Processor};
use crate::config::{ChainSpec, StageSpec};
use crate::containers::persist;
use crate::error::{Error, Result};

/// Where the most recent `process` call got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Running { stage: usize },
    Done,
    Failed { stage: usize },
}

struct ChainStage {
    spec: StageSpec,
    processor: Box<dyn Processor>,
}

/// Saved state of one stateful stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageState {
    pub position: usize,
    pub processor_name: String,
    pub state: Value,
}

/// Ordered processors; stage `i`'s output feeds stage `i + 1`.
///
/// Not meant to be shared across threads; run one chain per worker.
pub struct ProcessingChain {
    registry: ProcessorRegistry,
    stages: Vec<ChainStage>,
    state: ChainState,
}

impl Default for ProcessingChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingChain {
    /// Empty chain resolving names against the built-in processors.
    pub fn new() -> Self {
        Self::with_registry(ProcessorRegistry::with_builtins())
    }

    pub fn with_registry(registry: ProcessorRegistry) -> Self {
        Self {
            registry,
            stages: Vec::new(),
            state: ChainState::Idle,
        }
    }

    /// Build every stage up front; unknown names and bad wiring fail here.
    pub fn from_spec(spec: &ChainSpec) -> Result<Self> {
        Self::from_spec_with_registry(spec, ProcessorRegistry::with_builtins())
    }

    pub fn from_spec_with_registry(spec: &ChainSpec, registry: ProcessorRegistry) -> Result<Self> {
        let mut chain = Self::with_registry(registry);
        for stage in &spec.chain {
            chain.push_processor(stage.clone())?;
        }
        info!(stages = chain.len(), "processing chain ready");
        Ok(chain)
    }

    /// Append a stage built from `spec`, checking it accepts the previous output.
    pub fn push_processor(&mut self, spec: StageSpec) -> Result<&mut Self> {
        let processor = self
            .registry
            .create(&spec.processor_name, spec.init_parameters.clone())?;
        if let Some(previous) = self.stages.last() {
            let produced = previous.processor.output_type();
            let expected = processor.input_type();
            if produced != expected {
                return Err(Error::config(format!(
                    "cannot connect [{}] ({} output) to [{}] ({} input)",
                    previous.spec.processor_name, produced, spec.processor_name, expected
                )));
            }
        }
        debug!(
            position = self.stages.len(),
            processor = %spec.processor_name,
            "stage added"
        );
        self.stages.push(ChainStage { spec, processor });
        Ok(self)
    }

    /// True when a stage with this registry or processor name is in the chain.
    pub fn processor_exists(&self, name: &str) -> bool {
        self.stages
            .iter()
            .any(|stage| stage.spec.processor_name == name || stage.processor.name() == name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_specs(&self) -> impl Iterator<Item = &StageSpec> {
        self.stages.iter().map(|stage| &stage.spec)
    }

    pub fn last_state(&self) -> ChainState {
        self.state
    }

    /// Run every stage in order; a failing stage aborts the chain.
    ///
    /// Each stage sees its `process_parameters` overlaid with `args`, reduced
    /// to the keywords it accepts.
    pub fn process(&mut self, input: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        if self.stages.is_empty() {
            return Err(Error::config("processing chain is empty"));
        }
        let mut current = input;
        for (position, stage) in self.stages.iter_mut().enumerate() {
            self.state = ChainState::Running { stage: position };
            let stage_args = args
                .merged_over(&stage.spec.process_parameters)
                .filtered(stage.processor.accepted_keywords());
            debug!(
                position,
                processor = stage.processor.name(),
                input = %current.summary(),
                "stage start"
            );
            current = match stage.processor.process(current, &stage_args) {
                Ok(output) => output,
                Err(err) => {
                    self.state = ChainState::Failed { stage: position };
                    error!(
                        position,
                        processor = %stage.spec.processor_name,
                        error = %err,
                        "stage failed"
                    );
                    return Err(Error::Stage {
                        position,
                        name: stage.spec.processor_name.clone(),
                        source: Box::new(err),
                    });
                }
            };
        }
        self.state = ChainState::Done;
        debug!(output = %current.summary(), "chain done");
        Ok(current)
    }

    /// Invoke `method` on every stage that knows it; returns how many did.
    pub fn call_method(&mut self, method: &str, args: &ProcessArgs) -> Result<usize> {
        let mut handled = 0;
        for stage in &mut self.stages {
            if stage.processor.command(method, args)? {
                handled += 1;
            }
        }
        if handled == 0 {
            debug!(method, "no stage handles method");
        }
        Ok(handled)
    }

    /// Hash of the stage specifications.
    pub fn hash(&self) -> String {
        ChainSpec::new(self.stage_specs().cloned().collect()).hash()
    }

    /// States of the stateful stages.
    pub fn state(&self) -> Result<Vec<StageState>> {
        let mut states = Vec::new();
        for (position, stage) in self.stages.iter().enumerate() {
            if let Some(state) = stage.processor.state()? {
                states.push(StageState {
                    position,
                    processor_name: stage.spec.processor_name.clone(),
                    state,
                });
            }
        }
        Ok(states)
    }

    /// Restore stage states; every entry is checked before any stage changes.
    pub fn load_state(&mut self, states: Vec<StageState>) -> Result<()> {
        let stage_count = self.stages.len();
        for saved in &states {
            let stage = self.stages.get(saved.position).ok_or_else(|| {
                Error::config(format!(
                    "saved state for stage {} but chain has {} stages",
                    saved.position, stage_count
                ))
            })?;
            if stage.spec.processor_name != saved.processor_name {
                return Err(Error::config(format!(
                    "saved state for [{}] does not match stage {} [{}]",
                    saved.processor_name, saved.position, stage.spec.processor_name
                )));
            }
        }
        for saved in states {
            self.stages[saved.position]
                .processor
                .load_state(saved.state)?;
        }
        Ok(())
    }

    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<&Self> {
        persist::save_json(&self.state()?, path)?;
        Ok(self)
    }

    pub fn load_state_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let states: Vec<StageState> = persist::load_json(path)?;
        self.load_state(states)?;
        Ok(self)
    }

    /// Table of stages: id, processor, input, output, init parameters.
    pub fn chain_string(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "{:<3} {:<38} {:<16} {:<16} {}",
            "id", "processor", "input", "output", "init parameters"
        );
        for (position, stage) in self.stages.iter().enumerate() {
            let init = if stage.spec.init_parameters.is_null() {
                "-".to_string()
            } else {
                stage.spec.init_parameters.to_string()
            };
            let _ = writeln!(
                text,
                "{:<3} {:<38} {:<16} {:<16} {}",
                position,
                stage.spec.processor_name,
                stage.processor.input_type().to_string(),
                stage.processor.output_type().to_string(),
                init
            );
        }
        text
    }

    pub fn log_chain(&self) {
        for line in self.chain_string().lines() {
            info!("{}", line);
        }
    }
}
