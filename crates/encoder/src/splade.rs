//! SPLADE masked-LM encoder
//!
//! Loads a BERT-family masked-LM checkpoint (config.json, tokenizer.json,
//! model.safetensors) from a local directory and produces sparse query
//! vectors with the SPLADE pooling:
//!
//! ```text
//! max over sequence of log(1 + relu(logits)) * attention_mask
//! ```

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertForMaskedLM, Config};
use tokenizers::Tokenizer;

use crate::{EncoderError, QueryEncoder, SparseVector};

/// Encoder configuration
#[derive(Debug, Clone)]
pub struct SpladeEncoderConfig {
    /// Directory holding config.json, tokenizer.json, model.safetensors
    pub model_dir: std::path::PathBuf,
    /// Hard limit on query length in tokens (including special tokens)
    pub max_query_tokens: usize,
}

impl Default for SpladeEncoderConfig {
    fn default() -> Self {
        Self {
            model_dir: std::path::PathBuf::from("models/splade-cocondenser-ensembledistil"),
            max_query_tokens: 512,
        }
    }
}

/// SPLADE query encoder pinned to the best available device
pub struct SpladeEncoder {
    model: BertForMaskedLM,
    tokenizer: Tokenizer,
    device: Device,
    max_query_tokens: usize,
}

impl SpladeEncoder {
    /// Load the encoder from a local model directory
    pub fn load(config: SpladeEncoderConfig) -> Result<Self, EncoderError> {
        let model_dir = &config.model_dir;

        if !model_dir.exists() {
            return Err(EncoderError::Model(format!(
                "Encoder model not found at {:?}",
                model_dir
            )));
        }

        tracing::info!("Loading sparse encoder from {:?}", model_dir);

        let device = Device::cuda_if_available(0)
            .map_err(|e| EncoderError::Model(format!("Device selection failed: {}", e)))?;

        // Model config
        let config_str = std::fs::read_to_string(model_dir.join("config.json"))?;
        let bert_config: Config = serde_json::from_str(&config_str)
            .map_err(|e| EncoderError::Model(format!("Failed to parse config.json: {}", e)))?;

        // Weights
        let weights_path = model_dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| EncoderError::Model(format!("Failed to load weights: {}", e)))?
        };

        let model = BertForMaskedLM::load(vb, &bert_config)
            .map_err(|e| EncoderError::Model(format!("Failed to build masked-LM model: {}", e)))?;

        // Tokenizer, with truncation disabled: over-length queries must be
        // rejected, not silently clipped.
        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| EncoderError::Tokenizer(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(None)
            .map_err(|e| EncoderError::Tokenizer(format!("Failed to disable truncation: {}", e)))?;
        tokenizer.with_padding(None);

        tracing::info!(
            device = ?device,
            vocab = bert_config.vocab_size,
            "Sparse encoder loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            max_query_tokens: config.max_query_tokens,
        })
    }

    fn forward(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;

        let ids = encoding.get_ids();
        if ids.len() > self.max_query_tokens {
            return Err(EncoderError::TextTooLong);
        }

        let input_ids = Tensor::new(ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| EncoderError::Model(format!("Input tensor failed: {}", e)))?;
        let type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| EncoderError::Model(format!("Type-id tensor failed: {}", e)))?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| EncoderError::Model(format!("Mask tensor failed: {}", e)))?;

        let logits = self
            .model
            .forward(&input_ids, &type_ids, Some(&attention_mask))
            .map_err(|e| EncoderError::Model(format!("Forward pass failed: {}", e)))?;

        splade_pool(&logits, &attention_mask)
            .map_err(|e| EncoderError::Model(format!("Pooling failed: {}", e)))
    }
}

impl QueryEncoder for SpladeEncoder {
    fn encode_query(&self, text: &str) -> Result<SparseVector, EncoderError> {
        let pooled = self.forward(text)?;
        Ok(to_sparse(&pooled))
    }
}

/// SPLADE pooling over masked-LM logits.
///
/// `logits` is `[1, L, V]`, `attention_mask` is `[1, L]` of 0/1. Returns
/// the dense `[V]` vector `max_L(log(1 + relu(logits)) * mask)`; padding
/// positions contribute nothing because their mask entry is zero.
fn splade_pool(logits: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Vec<f32>> {
    let activated = logits.relu()?.affine(1.0, 1.0)?.log()?;
    let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let weighted = activated.broadcast_mul(&mask)?;
    weighted.max(1)?.squeeze(0)?.to_vec1::<f32>()
}

/// Keep only the non-zero vocabulary entries of a pooled vector
fn to_sparse(pooled: &[f32]) -> SparseVector {
    let entries = pooled
        .iter()
        .enumerate()
        .filter(|(_, w)| **w > 0.0)
        .map(|(term, w)| (term as u32, *w))
        .collect();
    SparseVector::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splade_pool_masks_padding() {
        let device = Device::Cpu;
        // Two positions over a 3-term vocabulary; the second position is
        // padding and must not reach the pooled vector.
        let logits = Tensor::new(
            &[[[1.0f32, -2.0, 0.5], [10.0, 10.0, 10.0]]],
            &device,
        )
        .unwrap();
        let mask = Tensor::new(&[[1u32, 0]], &device).unwrap();

        let pooled = splade_pool(&logits, &mask).unwrap();
        assert_eq!(pooled.len(), 3);

        // log(1 + relu(x)) of the first (unmasked) position only.
        assert!((pooled[0] - (1.0f32 + 1.0).ln()).abs() < 1e-6);
        assert_eq!(pooled[1], 0.0); // relu clamps the negative logit
        assert!((pooled[2] - (1.0f32 + 0.5).ln()).abs() < 1e-6);
    }

    #[test]
    fn test_splade_pool_max_over_sequence() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[[0.2f32, 3.0], [1.5, 0.1]]], &device).unwrap();
        let mask = Tensor::new(&[[1u32, 1]], &device).unwrap();

        let pooled = splade_pool(&logits, &mask).unwrap();

        // Per-term max across both positions.
        assert!((pooled[0] - (1.0f32 + 1.5).ln()).abs() < 1e-6);
        assert!((pooled[1] - (1.0f32 + 3.0).ln()).abs() < 1e-6);
    }

    #[test]
    fn test_to_sparse_drops_zero_weights() {
        let pooled = vec![0.0, 0.7, 0.0, 0.0, 1.2];
        let sparse = to_sparse(&pooled);
        assert_eq!(sparse.entries, vec![(1, 0.7), (4, 1.2)]);
    }

    #[test]
    fn test_to_sparse_all_zero() {
        let sparse = to_sparse(&[0.0, 0.0]);
        assert!(sparse.is_empty());
    }
}
