//! Ranked results and extracted benchmark records
//!
//! `ScoredDoc` is the universal intermediate form: every retrieval mode
//! (sparse, dense, fused) produces an ordered list of them.

use serde::{Deserialize, Serialize};

/// A single ranked document.
///
/// `document_id` is the paper's stem filename as stored in the `documents`
/// table; `score` is mode-specific (weighted term sum, inverse distance, or
/// RRF sum) and only meaningful within one result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub document_id: String,
    pub score: f64,
}

impl ScoredDoc {
    pub fn new(document_id: impl Into<String>, score: f64) -> Self {
        Self {
            document_id: document_id.into(),
            score,
        }
    }
}

/// One benchmark result extracted from a paper's cleaned markdown.
///
/// Only `task` and `metric` are required; everything else is best-effort
/// and depends on what the paper actually reports. Nulls are serialized so
/// clients see the full schema on every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Task the benchmark measures, e.g. "image classification".
    pub task: String,
    /// Metric name, e.g. "top-1 accuracy".
    pub metric: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_architecture: Option<String>,
    #[serde(default)]
    pub parameter_count: Option<f64>,
    /// Whether a larger metric value means a better model.
    #[serde(default)]
    pub metric_higher_is_better: Option<bool>,
    #[serde(default)]
    pub value: Option<f64>,
    /// Reported error bar on `value`, when the paper gives one.
    #[serde(default)]
    pub value_error: Option<f64>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub dataset_version: Option<String>,
    #[serde(default)]
    pub dataset_split: Option<String>,
    #[serde(default)]
    pub inference_time: Option<f64>,
    #[serde(default)]
    pub inference_time_unit: Option<String>,
    #[serde(default)]
    pub inference_device_class: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_doc_roundtrip() {
        let doc = ScoredDoc::new("attention-is-all-you-need", 0.42);
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("attention-is-all-you-need"));
        let back: ScoredDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_benchmark_result_lenient_parse() {
        // Records with only the required fields must parse.
        let json = r#"{"task": "machine translation", "metric": "BLEU"}"#;
        let record: BenchmarkResult = serde_json::from_str(json).unwrap();
        assert_eq!(record.task, "machine translation");
        assert_eq!(record.metric, "BLEU");
        assert!(record.value.is_none());
        assert!(record.dataset.is_none());
    }

    #[test]
    fn test_benchmark_result_full_parse() {
        let json = r#"{
            "task": "image classification",
            "metric": "top-1 accuracy",
            "model_name": "ViT-L/16",
            "model_architecture": "vision transformer",
            "parameter_count": 307000000.0,
            "metric_higher_is_better": true,
            "value": 87.76,
            "value_error": 0.03,
            "dataset": "ImageNet",
            "dataset_version": "ILSVRC2012",
            "dataset_split": "validation",
            "inference_time": 12.4,
            "inference_time_unit": "ms",
            "inference_device_class": "gpu"
        }"#;
        let record: BenchmarkResult = serde_json::from_str(json).unwrap();
        assert_eq!(record.model_name.as_deref(), Some("ViT-L/16"));
        assert_eq!(record.metric_higher_is_better, Some(true));
        assert_eq!(record.value, Some(87.76));
    }
}
