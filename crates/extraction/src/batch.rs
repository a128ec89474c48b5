//! Concurrent per-document extraction
//!
//! Fans extraction out across the top-k documents of a search response.
//! Concurrency is bounded by a shared semaphore (the global in-flight LLM
//! cap), each document gets its own deadline, and any per-document failure
//! collapses to `None` in that slot. Retrieval results are never held
//! hostage by extraction.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use paperdex_core::BenchmarkResult;
use paperdex_storage::ArtifactStore;

use crate::ResultExtractor;

/// Batch extractor configuration
#[derive(Debug, Clone)]
pub struct BatchExtractorConfig {
    /// Global cap on in-flight extraction calls
    pub max_concurrency: usize,
    /// Per-document deadline covering the markdown fetch and the LLM call
    pub document_timeout: Duration,
}

impl Default for BatchExtractorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            document_timeout: Duration::from_secs(60),
        }
    }
}

/// Fans extraction out over document batches
pub struct BatchExtractor {
    extractor: Arc<dyn ResultExtractor>,
    store: ArtifactStore,
    permits: Arc<Semaphore>,
    document_timeout: Duration,
}

impl BatchExtractor {
    pub fn new(
        config: BatchExtractorConfig,
        extractor: Arc<dyn ResultExtractor>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            extractor,
            store,
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            document_timeout: config.document_timeout,
        }
    }

    /// Extract benchmark results for each document id, order-preserving.
    ///
    /// One output slot per input id: `Some(records)` on success with at
    /// least one record, `None` on failure, timeout, or an empty
    /// extraction.
    pub async fn extract_batch(
        &self,
        document_ids: &[String],
    ) -> Vec<Option<Vec<BenchmarkResult>>> {
        let tasks = document_ids.iter().map(|id| self.extract_one(id.clone()));
        futures::future::join_all(tasks).await
    }

    async fn extract_one(&self, document_id: String) -> Option<Vec<BenchmarkResult>> {
        // Closed-semaphore errors cannot happen: the pool lives as long as
        // self. Treat them like any other per-document failure anyway.
        let _permit = self.permits.acquire().await.ok()?;

        let work = async {
            let markdown = self.store.document_markdown(&document_id).await?;
            self.extractor.extract(&markdown).await
        };

        match tokio::time::timeout(self.document_timeout, work).await {
            Ok(Ok(results)) if results.is_empty() => {
                tracing::debug!(document_id, "Extraction produced no records");
                None
            }
            Ok(Ok(results)) => Some(results),
            Ok(Err(e)) => {
                tracing::warn!(document_id, error = %e, "Extraction failed for document");
                None
            }
            Err(_) => {
                tracing::warn!(document_id, "Extraction timed out for document");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtractionError;
    use async_trait::async_trait;
    use object_store::path::Path as ObjectPath;
    use object_store::{memory::InMemory, ObjectStore, PutPayload};
    use parking_lot::Mutex;

    fn record(task: &str) -> BenchmarkResult {
        serde_json::from_value(serde_json::json!({"task": task, "metric": "accuracy"})).unwrap()
    }

    /// Extractor stub keyed on markdown content.
    struct StubExtractor {
        in_flight: Arc<Mutex<(usize, usize)>>, // (current, peak)
    }

    impl StubExtractor {
        fn new() -> Self {
            Self {
                in_flight: Arc::new(Mutex::new((0, 0))),
            }
        }

        fn peak(&self) -> usize {
            self.in_flight.lock().1
        }
    }

    #[async_trait]
    impl ResultExtractor for StubExtractor {
        async fn extract(&self, markdown: &str) -> Result<Vec<BenchmarkResult>, ExtractionError> {
            {
                let mut guard = self.in_flight.lock();
                guard.0 += 1;
                guard.1 = guard.1.max(guard.0);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            let result = match markdown {
                "fails" => Err(ExtractionError::Api("boom".to_string())),
                "empty" => Ok(Vec::new()),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(vec![record("slow")])
                }
                other => Ok(vec![record(other)]),
            };
            self.in_flight.lock().0 -= 1;
            result
        }
    }

    async fn seeded_store(docs: &[(&str, &str)]) -> ArtifactStore {
        let memory = InMemory::new();
        for (id, body) in docs {
            memory
                .put(
                    &ObjectPath::from(format!("{}-corrected.mmd", id)),
                    PutPayload::from(body.as_bytes().to_vec()),
                )
                .await
                .unwrap();
        }
        ArtifactStore::new(Arc::new(memory))
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let store = seeded_store(&[("a", "task-a"), ("b", "task-b"), ("c", "task-c")]).await;
        let batch = BatchExtractor::new(
            BatchExtractorConfig::default(),
            Arc::new(StubExtractor::new()),
            store,
        );

        let results = batch.extract_batch(&ids(&["a", "b", "c"])).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap()[0].task, "task-a");
        assert_eq!(results[1].as_ref().unwrap()[0].task, "task-b");
        assert_eq!(results[2].as_ref().unwrap()[0].task, "task-c");
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let store = seeded_store(&[("good", "ok"), ("bad", "fails")]).await;
        let batch = BatchExtractor::new(
            BatchExtractorConfig::default(),
            Arc::new(StubExtractor::new()),
            store,
        );

        // "missing" has no markdown in the store at all.
        let results = batch.extract_batch(&ids(&["good", "bad", "missing"])).await;

        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_none());
    }

    #[tokio::test]
    async fn test_batch_empty_extraction_is_none() {
        let store = seeded_store(&[("hollow", "empty")]).await;
        let batch = BatchExtractor::new(
            BatchExtractorConfig::default(),
            Arc::new(StubExtractor::new()),
            store,
        );

        let results = batch.extract_batch(&ids(&["hollow"])).await;
        assert_eq!(results, vec![None]);
    }

    #[tokio::test]
    async fn test_batch_timeout_is_none() {
        let store = seeded_store(&[("glacial", "slow")]).await;
        let batch = BatchExtractor::new(
            BatchExtractorConfig {
                max_concurrency: 2,
                document_timeout: Duration::from_millis(100),
            },
            Arc::new(StubExtractor::new()),
            store,
        );

        let results = batch.extract_batch(&ids(&["glacial"])).await;
        assert_eq!(results, vec![None]);
    }

    #[tokio::test]
    async fn test_batch_respects_concurrency_cap() {
        let docs: Vec<(String, String)> = (0..8)
            .map(|i| (format!("doc-{}", i), format!("task-{}", i)))
            .collect();
        let borrowed: Vec<(&str, &str)> = docs
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let store = seeded_store(&borrowed).await;

        let stub = Arc::new(StubExtractor::new());
        let batch = BatchExtractor::new(
            BatchExtractorConfig {
                max_concurrency: 2,
                document_timeout: Duration::from_secs(10),
            },
            stub.clone(),
            store,
        );

        let id_list: Vec<String> = docs.iter().map(|(a, _)| a.clone()).collect();
        let results = batch.extract_batch(&id_list).await;

        assert!(results.iter().all(|r| r.is_some()));
        assert!(stub.peak() <= 2, "peak concurrency {} exceeded cap", stub.peak());
    }
}
