//! Configuration types for the scimbulk resolver.
//!
//! Configuration is loaded from a single YAML file (conventionally
//! `scimbulk.yaml`). Every section is optional and falls back to defaults.
//!
//! # Sections
//!
//! - **bulk**: request limits, default `failOnErrors` threshold, concurrency
//! - **references**: reference-typed attributes per resource type
//! - **store**: settings for the bundled in-memory resource store
//! - **logging**: default log filter for the CLI

pub mod bulk;
pub mod references;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use bulk::BulkConfig;
pub use references::{AttributePath, ReferenceSchema};
pub use store::StoreConfig;

/// Complete resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    /// Bulk request limits and scheduling.
    #[serde(default)]
    pub bulk: BulkConfig,

    /// Reference attributes declared by the schema layer.
    #[serde(default)]
    pub references: ReferenceSchema,

    /// In-memory store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResolverConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bulk.max_operations == 0 {
            return Err(ConfigError::Config(
                "bulk.max_operations must be at least 1".to_string(),
            ));
        }
        if self.bulk.max_concurrency == 0 {
            return Err(ConfigError::Config(
                "bulk.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.bulk.fail_on_errors == Some(0) {
            return Err(ConfigError::Config(
                "bulk.fail_on_errors must be at least 1 when set".to_string(),
            ));
        }
        self.references.validate()
    }
}
