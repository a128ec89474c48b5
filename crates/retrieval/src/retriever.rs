//! Hybrid retriever
//!
//! Combines sparse inverted-index scoring and dense ANN search, with RRF
//! fusion for the hybrid mode. This is the single entry point the HTTP
//! handlers call; all three modes go through it.

use std::collections::HashMap;
use std::sync::Arc;

use paperdex_core::ScoredDoc;
use paperdex_encoder::QueryEncoder;

use crate::dense_index::{dedup_neighbours, DenseIndex};
use crate::embeddings::Embedder;
use crate::fusion::reciprocal_rank_fusion;
use crate::sparse_index::SparseIndex;
use crate::RetrievalError;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// ANN over-fetch multiplier absorbing duplicate document ids
    pub ann_overfetch: usize,
    /// Candidate floor for hybrid fusion: both branches run with
    /// `max(ann_overfetch * k, fusion_k_floor)` candidates
    pub fusion_k_floor: usize,
    /// HNSW ef parameter for searches
    pub ef_search: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            ann_overfetch: 4,
            fusion_k_floor: 50,
            ef_search: 64,
        }
    }
}

/// Hybrid retriever over the loaded indices
pub struct HybridRetriever {
    config: RetrieverConfig,
    encoder: Arc<dyn QueryEncoder>,
    embedder: Arc<dyn Embedder>,
    sparse: SparseIndex,
    dense: Arc<DenseIndex>,
    doc_map: Arc<HashMap<usize, String>>,
}

impl HybridRetriever {
    pub fn new(
        config: RetrieverConfig,
        encoder: Arc<dyn QueryEncoder>,
        embedder: Arc<dyn Embedder>,
        sparse: SparseIndex,
        dense: Arc<DenseIndex>,
        doc_map: Arc<HashMap<usize, String>>,
    ) -> Self {
        Self {
            config,
            encoder,
            embedder,
            sparse,
            dense,
            doc_map,
        }
    }

    /// Sparse retrieval: encode the query, then run the weighted join.
    ///
    /// The encoder forward pass is CPU/GPU-bound and runs on a blocking
    /// thread so it never stalls the async runtime.
    pub async fn search_sparse(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        let encoder = Arc::clone(&self.encoder);
        let query_owned = query.to_string();
        let sparse_query = tokio::task::spawn_blocking(move || encoder.encode_query(&query_owned))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))??;

        self.sparse.search(sparse_query, k).await
    }

    /// Dense retrieval: embed the query, over-fetch neighbours, keep the
    /// first occurrence of each document, truncate to k.
    pub async fn search_dense(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        let embedding = self.embedder.embed(query).await?;

        let dense = Arc::clone(&self.dense);
        let doc_map = Arc::clone(&self.doc_map);
        let fetch = k * self.config.ann_overfetch;
        let ef = self.config.ef_search.max(fetch);

        tokio::task::spawn_blocking(move || {
            let neighbours = dense.nearest(&embedding, fetch, ef);
            dedup_neighbours(&neighbours, &doc_map, k)
        })
        .await
        .map_err(|e| RetrievalError::Task(e.to_string()))
    }

    /// Hybrid retrieval: both branches in parallel with a widened candidate
    /// list, fused by reciprocal rank into the final top-k.
    pub async fn search_hybrid(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        let fusion_k = (k * self.config.ann_overfetch).max(self.config.fusion_k_floor);

        let (sparse_results, dense_results) = tokio::try_join!(
            self.search_sparse(query, fusion_k),
            self.search_dense(query, fusion_k),
        )?;

        Ok(reciprocal_rank_fusion(&dense_results, &sparse_results, k))
    }
}
