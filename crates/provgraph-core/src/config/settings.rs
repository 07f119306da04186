use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One pipeline component to attach at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Registry type name, e.g. `graph-finesse`.
    pub name: String,
    /// Whitespace-separated `key=value` arguments handed to the factory.
    #[serde(default)]
    pub args: String,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Storage operations between automatic commits.
    pub commit_interval: usize,
    /// How long the dispatch loop parks when every buffer is empty.
    pub idle_wait_ms: u64,
    /// Annotation stamped on every element with its source's name, stripped before sinks.
    pub source_annotation: String,
    pub sources: Vec<ComponentSpec>,
    /// Chain order, head first.
    pub filters: Vec<ComponentSpec>,
    pub sinks: Vec<ComponentSpec>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            commit_interval: 10_000,
            idle_wait_ms: 50,
            source_annotation: "source".into(),
            sources: Vec::new(),
            filters: Vec::new(),
            sinks: Vec::new(),
        }
    }
}

impl KernelConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let data = std::fs::read_to_string(path)?;
        let config: KernelConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.commit_interval == 0 {
            return Err(CoreError::Config("commit_interval must be at least 1".into()));
        }
        if self.source_annotation.is_empty() {
            return Err(CoreError::Config("source_annotation must not be empty".into()));
        }
        if self.source_annotation == crate::model::TYPE_KEY {
            return Err(CoreError::Config("source_annotation cannot be 'type'".into()));
        }
        Ok(())
    }
}
