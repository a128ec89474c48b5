//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Neural-sparse encoder configuration
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Retrieval configuration (top-k defaults, fusion, ANN parameters)
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Dense embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Structured benchmark extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_retrieval()?;
        self.validate_embedding()?;
        self.validate_extraction()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;

        if retrieval.default_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.default_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if retrieval.max_k == 0 || retrieval.max_k < retrieval.default_k {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.max_k".to_string(),
                message: format!(
                    "Must be at least default_k ({}), got {}",
                    retrieval.default_k, retrieval.max_k
                ),
            });
        }

        if retrieval.ann_overfetch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.ann_overfetch".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if retrieval.ef_search == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.ef_search".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_embedding(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.dimension".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_extraction(&self) -> Result<(), ConfigError> {
        let extraction = &self.extraction;

        if extraction.enabled && extraction.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "extraction.max_concurrency".to_string(),
                message: "Must be at least 1 when extraction is enabled".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}
fn default_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding indices, encoder weights, and paper artifacts
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Local directory the loader downloads index artifacts into
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

fn default_bucket() -> String {
    std::env::var("ML_PAPERS_BUCKET_NAME").unwrap_or_default()
}

fn default_work_dir() -> String {
    "./data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            work_dir: default_work_dir(),
        }
    }
}

/// Neural-sparse encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Model directory name under `Models/` in the bucket
    #[serde(default = "default_encoder_model")]
    pub model_name: String,

    /// Maximum query length in tokens; longer queries are rejected.
    /// Encoder-specific: 512 for the SPLADE/BERT family.
    #[serde(default = "default_max_query_tokens")]
    pub max_query_tokens: usize,
}

fn default_encoder_model() -> String {
    "splade-cocondenser-ensembledistil".to_string()
}
fn default_max_query_tokens() -> usize {
    512
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model_name: default_encoder_model(),
            max_query_tokens: default_max_query_tokens(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default top-k when the request omits `k`
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Largest accepted `k`; requests above this are rejected
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Candidate-list floor for hybrid fusion: both branches run with
    /// `max(ann_overfetch * k, fusion_k_floor)` candidates
    #[serde(default = "default_fusion_k_floor")]
    pub fusion_k_floor: usize,

    /// ANN over-fetch multiplier absorbing duplicate document ids
    #[serde(default = "default_ann_overfetch")]
    pub ann_overfetch: usize,

    /// HNSW ef parameter for searches
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
}

fn default_k() -> usize {
    20
}
fn default_max_k() -> usize {
    1000
}
fn default_fusion_k_floor() -> usize {
    50
}
fn default_ann_overfetch() -> usize {
    4
}
fn default_ef_search() -> usize {
    64
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            max_k: default_max_k(),
            fusion_k_floor: default_fusion_k_floor(),
            ann_overfetch: default_ann_overfetch(),
            ef_search: default_ef_search(),
        }
    }
}

/// Dense embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API base URL
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector width; must match the ANN index dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_embedding_dimension() -> usize {
    3072
}
fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_seconds: default_embedding_timeout(),
        }
    }
}

/// Structured benchmark extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Allow requests to ask for extraction over their top-k results
    #[serde(default)]
    pub enabled: bool,

    /// API base URL
    #[serde(default = "default_extraction_endpoint")]
    pub endpoint: String,

    /// Extraction model identifier
    #[serde(default = "default_extraction_model")]
    pub model: String,

    /// Global cap on in-flight extraction calls
    #[serde(default = "default_extraction_concurrency")]
    pub max_concurrency: usize,

    /// Per-document deadline in seconds; documents past it come back null
    #[serde(default = "default_extraction_timeout")]
    pub timeout_seconds: u64,

    /// Retries on transient extraction failures
    #[serde(default = "default_extraction_retries")]
    pub max_retries: usize,
}

fn default_extraction_endpoint() -> String {
    "https://api.openai.com".to_string()
}
fn default_extraction_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_extraction_concurrency() -> usize {
    8
}
fn default_extraction_timeout() -> u64 {
    60
}
fn default_extraction_retries() -> usize {
    1
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_extraction_endpoint(),
            model: default_extraction_model(),
            max_concurrency: default_extraction_concurrency(),
            timeout_seconds: default_extraction_timeout(),
            max_retries: default_extraction_retries(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (PAPERDEX prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("PAPERDEX")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval.default_k, 20);
        assert_eq!(settings.retrieval.fusion_k_floor, 50);
        assert_eq!(settings.embedding.dimension, 3072);
        assert!(!settings.extraction.enabled);
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();

        settings.server.port = 0;
        assert!(settings.validate().is_err());
        settings.server.port = 8080;

        settings.server.timeout_seconds = 0;
        assert!(settings.validate().is_err());
        settings.server.timeout_seconds = 120;

        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_retrieval_validation() {
        let mut settings = Settings::default();

        settings.retrieval.default_k = 0;
        assert!(settings.validate().is_err());
        settings.retrieval.default_k = 20;

        // max_k below default_k is inconsistent
        settings.retrieval.max_k = 10;
        assert!(settings.validate().is_err());
        settings.retrieval.max_k = 1000;

        settings.retrieval.ann_overfetch = 0;
        assert!(settings.validate().is_err());
        settings.retrieval.ann_overfetch = 4;

        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_extraction_validation() {
        let mut settings = Settings::default();
        settings.extraction.enabled = true;
        settings.extraction.max_concurrency = 0;
        assert!(settings.validate().is_err());

        settings.extraction.max_concurrency = 8;
        assert!(settings.validate().is_ok());
    }
}
