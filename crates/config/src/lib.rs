//! Configuration for the paperdex retrieval service
//!
//! Settings are layered: `config/default.yaml`, then `config/{env}.yaml`,
//! then `PAPERDEX__*` environment variables (highest priority).

pub mod settings;

pub use settings::{
    load_settings, EmbeddingConfig, EncoderConfig, ExtractionConfig, ObservabilityConfig,
    RetrievalConfig, ServerConfig, Settings, StorageConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
