//! Neural-sparse query encoding
//!
//! Wraps a SPLADE-family masked-LM encoder: a query string is tokenized,
//! run through the model, and pooled into a sparse (term id, weight) vector
//! over the tokenizer vocabulary. Inference is native Rust via Candle with
//! SafeTensors weights, so the serving binary carries no Python runtime.

pub mod splade;

pub use splade::{SpladeEncoder, SpladeEncoderConfig};

use thiserror::Error;

/// Encoder errors
#[derive(Error, Debug)]
pub enum EncoderError {
    /// The tokenized query exceeds the encoder's sequence limit. Surfaced
    /// to clients as a 400, unlike every other encoder failure.
    #[error("Input text is too long")]
    TextTooLong,

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A sparse query vector: non-zero (term id, weight) pairs over the
/// encoder vocabulary. Term ids are unique; order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub entries: Vec<(u32, f32)>,
}

impl SparseVector {
    pub fn new(entries: Vec<(u32, f32)>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Query-side sparse encoder seam
///
/// `SpladeEncoder` is the production implementation; tests substitute
/// deterministic stubs. Encoding is CPU/GPU-bound and synchronous; async
/// callers run it on a blocking thread.
pub trait QueryEncoder: Send + Sync {
    fn encode_query(&self, text: &str) -> Result<SparseVector, EncoderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_vector_empty() {
        let v = SparseVector::default();
        assert!(v.is_empty());
        assert_eq!(v.len(), 0);
    }
}
