//! Dense embedding client
//!
//! Turns a query string into a fixed-width float vector via the OpenAI
//! embeddings API. The vector width must match the ANN index; the loader
//! verifies this once at startup with a probe call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::RetrievalError;

/// Query embedding seam
///
/// Production uses `OpenAiEmbedder`; tests substitute deterministic stubs.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    /// Vector width this embedder produces
    fn dim(&self) -> usize;
}

/// Embedding client configuration
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key (from OPENAI_API_KEY or direct)
    pub api_key: String,
    /// API base URL (for testing or proxy)
    pub endpoint: String,
    /// Embedding model identifier
    pub model: String,
    /// Expected vector width
    pub dimension: usize,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for OpenAiEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            endpoint: "https://api.openai.com".to_string(),
            model: "text-embedding-3-large".to_string(),
            dimension: 3072,
            timeout: Duration::from_secs(30),
        }
    }
}

/// OpenAI embeddings client
pub struct OpenAiEmbedder {
    config: OpenAiEmbedderConfig,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self, RetrievalError> {
        if config.api_key.is_empty() {
            return Err(RetrievalError::Upstream(
                "OPENAI_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrievalError::Upstream(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let request = EmbeddingRequest {
            input: text.to_string(),
            model: self.config.model.clone(),
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::Upstream(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Upstream(format!(
                "Embedding service returned HTTP {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Upstream(format!("Invalid embedding response: {}", e)))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::Upstream("No embedding returned".to_string()))?;

        if embedding.len() != self.config.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.config.dimension,
                got: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.config.dimension
    }
}

// =============================================================================
// Embeddings API types
// =============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OpenAiEmbedderConfig::default();
        assert_eq!(config.model, "text-embedding-3-large");
        assert_eq!(config.dimension, 3072);
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = OpenAiEmbedderConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(OpenAiEmbedder::new(config).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "data": [{"embedding": [0.1, -0.2, 0.3], "index": 0}],
            "model": "text-embedding-3-large",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].embedding, vec![0.1, -0.2, 0.3]);
    }
}
