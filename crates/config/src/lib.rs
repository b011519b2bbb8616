//! Configuration for the sales agent
//!
//! Settings are layered: built-in defaults < `config/default.yaml` <
//! `config/{env}.yaml` < `SALES_AGENT__*` environment variables.

pub mod settings;

pub use settings::{
    load_settings, LlmConfig, ObservabilityConfig, PersistenceConfig, RagConfig, ServerConfig,
    Settings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
