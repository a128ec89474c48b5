//! Hybrid retrieval over the paper corpus
//!
//! Three retrieval modes share one intermediate form (`ScoredDoc`):
//! - sparse: weighted-sum scoring against a SQLite inverted index keyed by
//!   neural-sparse term ids
//! - dense: ANN lookup over fixed-width embeddings with first-occurrence
//!   deduplication
//! - hybrid: both branches in parallel, fused with reciprocal rank fusion

pub mod dense_index;
pub mod embeddings;
pub mod fusion;
pub mod retriever;
pub mod sparse_index;

pub use dense_index::DenseIndex;
pub use embeddings::{Embedder, OpenAiEmbedder, OpenAiEmbedderConfig};
pub use fusion::reciprocal_rank_fusion;
pub use retriever::{HybridRetriever, RetrieverConfig};
pub use sparse_index::SparseIndex;

use paperdex_encoder::EncoderError;
use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Sparse index query failed: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Embedding service error: {0}")]
    Upstream(String),

    #[error("Embedding dimension mismatch: index expects {expected}, service returned {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Blocking task failed: {0}")]
    Task(String),
}
