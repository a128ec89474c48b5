//! Resource loader
//!
//! One-shot bootstrap run on a background task at startup: download the
//! sparse index, the encoder model directory, and the dense ANN index from
//! object storage, open everything read-only, verify the embedding
//! dimension against the ANN index, and publish the search context. The
//! service is useless without its indices, so any failure logs and
//! terminates the process; the supervisor restarts it.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use paperdex_config::Settings;
use paperdex_encoder::{EncoderError, QueryEncoder, SpladeEncoder, SpladeEncoderConfig};
use paperdex_extraction::{
    BatchExtractor, BatchExtractorConfig, ExtractionError, OpenAiExtractor, OpenAiExtractorConfig,
};
use paperdex_retrieval::{
    DenseIndex, Embedder, HybridRetriever, OpenAiEmbedder, OpenAiEmbedderConfig, RetrievalError,
    RetrieverConfig, SparseIndex,
};
use paperdex_storage::{ArtifactStore, StorageError};

use crate::state::{AppState, SearchContext};

/// Remote artifact names within the bucket
const SPARSE_INDEX_OBJECT: &str = "Index/sparse_index.db";
const DENSE_INDEX_BASENAME: &str = "dense_index";

/// Loader errors
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Index error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Extraction setup error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("ANN index dimension {index} does not match embedding dimension {embedding}")]
    DimensionMismatch { index: usize, embedding: usize },

    #[error("Blocking task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the bootstrap and publish the result, or exit the process.
pub async fn run(state: AppState) {
    match bootstrap(&state.settings).await {
        Ok(context) => {
            state.publish(context);
            tracing::info!("All resources downloaded and loaded, service is ready");
        }
        Err(e) => {
            tracing::error!(error = %e, "Resource loading failed, shutting down");
            std::process::exit(1);
        }
    }
}

/// Fetch and open every serve-time resource.
pub async fn bootstrap(settings: &Settings) -> Result<SearchContext, LoaderError> {
    let store = ArtifactStore::gcs(&settings.storage.bucket)?;
    bootstrap_with_store(settings, store).await
}

/// Bootstrap against an explicit store (tests inject the in-memory backend)
pub async fn bootstrap_with_store(
    settings: &Settings,
    store: ArtifactStore,
) -> Result<SearchContext, LoaderError> {
    let work_dir = Path::new(&settings.storage.work_dir);
    tokio::fs::create_dir_all(work_dir).await?;

    // 1. Sparse index database
    let db_path = work_dir.join("sparse_index.db");
    tracing::info!(object = SPARSE_INDEX_OBJECT, "Downloading sparse index");
    store.fetch_to_file(SPARSE_INDEX_OBJECT, &db_path).await?;
    let sparse = SparseIndex::open(&db_path)?;
    tracing::info!("Sparse index opened");

    // 2. Encoder model directory
    let model_name = settings.encoder.model_name.clone();
    let model_dir = work_dir.join(&model_name);
    store
        .fetch_prefix(&format!("Models/{}", model_name), &model_dir)
        .await?;

    let encoder_config = SpladeEncoderConfig {
        model_dir: model_dir.clone(),
        max_query_tokens: settings.encoder.max_query_tokens,
    };
    let encoder: Arc<dyn QueryEncoder> =
        Arc::new(run_blocking(move || SpladeEncoder::load(encoder_config)).await??);

    // 3. Dense ANN index (graph + data dump pair)
    for suffix in ["hnsw.graph", "hnsw.data"] {
        let object = format!("Index/{}.{}", DENSE_INDEX_BASENAME, suffix);
        tracing::info!(object, "Downloading dense index");
        store
            .fetch_to_file(&object, &work_dir.join(format!("{}.{}", DENSE_INDEX_BASENAME, suffix)))
            .await?;
    }
    let dense_dir = work_dir.to_path_buf();
    let dense = Arc::new(
        run_blocking(move || DenseIndex::load(&dense_dir, DENSE_INDEX_BASENAME)).await??,
    );

    // 4. ANN-slot to document-id mapping
    let sparse_for_map = sparse.clone();
    let doc_map = Arc::new(run_blocking(move || sparse_for_map.document_map()).await??);
    tracing::info!(documents = doc_map.len(), "Document map loaded");

    // 5. Embedding client, probed once so a dimension mismatch between the
    // embedding service and the ANN index kills the process now instead of
    // failing every dense query later.
    let embedder = OpenAiEmbedder::new(OpenAiEmbedderConfig {
        endpoint: settings.embedding.endpoint.clone(),
        model: settings.embedding.model.clone(),
        dimension: settings.embedding.dimension,
        timeout: std::time::Duration::from_secs(settings.embedding.timeout_seconds),
        ..Default::default()
    })?;
    let probe = embedder.embed("dimension probe").await?;
    if probe.len() != dense.dimension() {
        return Err(LoaderError::DimensionMismatch {
            index: dense.dimension(),
            embedding: probe.len(),
        });
    }

    let retriever = HybridRetriever::new(
        RetrieverConfig {
            ann_overfetch: settings.retrieval.ann_overfetch,
            fusion_k_floor: settings.retrieval.fusion_k_floor,
            ef_search: settings.retrieval.ef_search,
        },
        encoder,
        Arc::new(embedder),
        sparse,
        dense,
        doc_map,
    );

    let extractor = if settings.extraction.enabled {
        let client = OpenAiExtractor::new(OpenAiExtractorConfig {
            endpoint: settings.extraction.endpoint.clone(),
            model: settings.extraction.model.clone(),
            timeout: std::time::Duration::from_secs(settings.extraction.timeout_seconds),
            max_retries: settings.extraction.max_retries,
            ..Default::default()
        })?;
        Some(BatchExtractor::new(
            BatchExtractorConfig {
                max_concurrency: settings.extraction.max_concurrency,
                document_timeout: std::time::Duration::from_secs(
                    settings.extraction.timeout_seconds,
                ),
            },
            Arc::new(client),
            store,
        ))
    } else {
        None
    };

    Ok(SearchContext {
        retriever,
        extractor,
    })
}

async fn run_blocking<T, F>(f: F) -> Result<T, LoaderError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoaderError::Task(e.to_string()))
}
