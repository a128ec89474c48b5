//! OpenAI structured-extraction client
//!
//! Sends the paper body with a schema-anchored system prompt and a JSON
//! schema response format, so the model's output parses directly into
//! `BenchmarkResult` records.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use paperdex_core::BenchmarkResult;

use crate::{ExtractionError, ResultExtractor};

const SYSTEM_PROMPT: &str = "You are extracting benchmark results from a machine-learning \
research paper. Report every quantitative benchmark result the paper states for its own \
models and for baselines it reproduces. For each result fill in: task, model_name, \
model_architecture, parameter_count, metric, metric_higher_is_better, value, value_error, \
dataset, dataset_version, dataset_split, inference_time, inference_time_unit, \
inference_device_class. task and metric are required; leave any other field null when the \
paper does not state it. Do not invent numbers. Return an empty list if the paper reports \
no benchmark results.";

/// Extraction client configuration
#[derive(Debug, Clone)]
pub struct OpenAiExtractorConfig {
    /// API key (from OPENAI_API_KEY or direct)
    pub api_key: String,
    /// API base URL (for testing or proxy)
    pub endpoint: String,
    /// Model to use
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retries on transient failures
    pub max_retries: usize,
}

impl Default for OpenAiExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-4.1-mini".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 1,
        }
    }
}

/// OpenAI chat-completions extraction client
pub struct OpenAiExtractor {
    config: OpenAiExtractorConfig,
    client: Client,
}

impl OpenAiExtractor {
    pub fn new(config: OpenAiExtractorConfig) -> Result<Self, ExtractionError> {
        if config.api_key.is_empty() {
            return Err(ExtractionError::Configuration(
                "OPENAI_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn request_once(&self, markdown: &str) -> Result<Vec<BenchmarkResult>, ExtractionError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: markdown.to_string(),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: "benchmark_results".to_string(),
                    schema: results_schema(),
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ExtractionError::InvalidResponse("No choices returned".to_string()))?;

        parse_results(&content)
    }
}

#[async_trait]
impl ResultExtractor for OpenAiExtractor {
    async fn extract(&self, markdown: &str) -> Result<Vec<BenchmarkResult>, ExtractionError> {
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }
            match self.request_once(markdown).await {
                Ok(results) => return Ok(results),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Extraction attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ExtractionError::Api("Extraction failed without error".to_string())))
    }
}

/// Parse the model's JSON content into benchmark records.
///
/// Accepts either the schema-wrapped form `{"results": [...]}` or a bare
/// top-level array, since older models sometimes drop the wrapper.
fn parse_results(content: &str) -> Result<Vec<BenchmarkResult>, ExtractionError> {
    if let Ok(wrapper) = serde_json::from_str::<ResultsWrapper>(content) {
        return Ok(wrapper.results);
    }
    serde_json::from_str::<Vec<BenchmarkResult>>(content)
        .map_err(|e| ExtractionError::InvalidResponse(format!("Unparseable extraction: {}", e)))
}

/// JSON schema the response format declares. Kept in code rather than a
/// sidecar file so the schema and the `BenchmarkResult` struct change
/// together.
fn results_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "task": {"type": "string"},
                        "metric": {"type": "string"},
                        "model_name": {"type": ["string", "null"]},
                        "model_architecture": {"type": ["string", "null"]},
                        "parameter_count": {"type": ["number", "null"]},
                        "metric_higher_is_better": {"type": ["boolean", "null"]},
                        "value": {"type": ["number", "null"]},
                        "value_error": {"type": ["number", "null"]},
                        "dataset": {"type": ["string", "null"]},
                        "dataset_version": {"type": ["string", "null"]},
                        "dataset_split": {"type": ["string", "null"]},
                        "inference_time": {"type": ["number", "null"]},
                        "inference_time_unit": {"type": ["string", "null"]},
                        "inference_device_class": {"type": ["string", "null"]}
                    },
                    "required": ["task", "metric"]
                }
            }
        },
        "required": ["results"]
    })
}

// =============================================================================
// Chat completions API types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ResultsWrapper {
    results: Vec<BenchmarkResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let config = OpenAiExtractorConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(OpenAiExtractor::new(config).is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4.1-mini".to_string(),
            messages: vec![ChatMessage {
                role: "system".to_string(),
                content: "extract".to_string(),
            }],
            response_format: ResponseFormat {
                kind: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: "benchmark_results".to_string(),
                    schema: results_schema(),
                },
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"type\":\"json_schema\""));
        assert!(json.contains("benchmark_results"));
    }

    #[test]
    fn test_parse_wrapped_results() {
        let content = r#"{"results": [
            {"task": "question answering", "metric": "F1", "value": 88.5,
             "dataset": "SQuAD", "metric_higher_is_better": true}
        ]}"#;
        let results = parse_results(content).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].task, "question answering");
        assert_eq!(results[0].value, Some(88.5));
    }

    #[test]
    fn test_parse_bare_array() {
        let content = r#"[{"task": "parsing", "metric": "LAS"}]"#;
        let results = parse_results(content).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metric, "LAS");
    }

    #[test]
    fn test_parse_empty_results() {
        let results = parse_results(r#"{"results": []}"#).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_results("the paper reports no benchmarks").is_err());
    }

    #[test]
    fn test_chat_response_parsing() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"results\": []}"}}],
            "usage": {"prompt_tokens": 1200, "completion_tokens": 8}
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.content, "{\"results\": []}");
    }
}
