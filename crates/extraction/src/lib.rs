//! Structured benchmark extraction
//!
//! For each top-ranked paper the service can pull the cleaned markdown body
//! from object storage and run it through a structured-extraction LLM,
//! producing typed `BenchmarkResult` records. Per-document work fans out
//! concurrently under a bounded permit pool; a failed or empty extraction
//! yields `None` for that document and never fails the batch.

pub mod batch;
pub mod client;

pub use batch::{BatchExtractor, BatchExtractorConfig};
pub use client::{OpenAiExtractor, OpenAiExtractorConfig};

use async_trait::async_trait;
use thiserror::Error;

use paperdex_core::BenchmarkResult;

/// Extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid extraction response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] paperdex_storage::StorageError),
}

/// Structured-extraction seam
///
/// `OpenAiExtractor` is the production implementation; tests substitute
/// deterministic stubs.
#[async_trait]
pub trait ResultExtractor: Send + Sync {
    /// Extract every benchmark result reported in one paper's markdown
    async fn extract(&self, markdown: &str) -> Result<Vec<BenchmarkResult>, ExtractionError>;
}
