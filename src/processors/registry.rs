use std::collections::BTreeMap;

use serde_json::Value;

use super::{audio, data, encoders, features, io, Processor};
use crate::error::{Error, Result};

/// Builds a processor from its `init_parameters`.
pub type ProcessorFactory = Box<dyn Fn(Value) -> Result<Box<dyn Processor>> + Send + Sync>;

/// Prefix under which built-ins are also reachable, e.g.
/// `featflow.processors.MelExtractorProcessor`.
pub const QUALIFIED_PREFIX: &str = "featflow.processors.";

/// Name to factory lookup used when building chains.
pub struct ProcessorRegistry {
    factories: BTreeMap<String, ProcessorFactory>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProcessorRegistry {
    /// Registry without any processors.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        audio::register(&mut registry);
        features::register(&mut registry);
        io::register(&mut registry);
        data::register(&mut registry);
        encoders::register(&mut registry);
        registry
    }

    /// Add or replace a factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Value) -> Result<Box<dyn Processor>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    fn resolve(&self, name: &str) -> Option<&ProcessorFactory> {
        self.factories.get(name).or_else(|| {
            name.strip_prefix(QUALIFIED_PREFIX)
                .and_then(|short| self.factories.get(short))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, name: &str, init_parameters: Value) -> Result<Box<dyn Processor>> {
        let factory = self
            .resolve(name)
            .ok_or_else(|| Error::config(format!("unknown processor [{}]", name)))?;
        factory(init_parameters)
    }
}
