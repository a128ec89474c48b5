//! HTTP endpoints
//!
//! Three POST search endpoints sharing one request shape, plus liveness,
//! readiness, and metrics routes. Every search handler follows the same
//! order: readiness gate, request validation, pipeline, response shaping.
//! Nothing downstream runs for a request that fails the first two steps.

use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use paperdex_core::{BenchmarkResult, ScoredDoc};
use paperdex_encoder::EncoderError;
use paperdex_retrieval::RetrievalError;

use crate::metrics;
use crate::state::{AppState, SearchContext};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.settings.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout_layer = TimeoutLayer::new(Duration::from_secs(server.timeout_seconds));

    Router::new()
        // Search endpoints
        .route("/search/sparse", post(search_sparse))
        .route("/search/dense", post(search_dense))
        .route("/search/hybrid", post(search_hybrid))
        // Health and readiness
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(timeout_layer)
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns a permissive layer (for dev)
/// - Otherwise uses the configured origins; an empty list means no
///   cross-origin callers are expected and only same-origin requests pass
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Search request body, shared by all three endpoints
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchRequest {
    query: String,
    k: Option<usize>,
    /// Run structured benchmark extraction over the top-k results.
    /// Honored only when extraction is enabled in settings.
    extract: Option<bool>,
}

/// One ranked result in the response
#[derive(Debug, Serialize)]
struct SearchResultBody {
    document_id: String,
    score: f64,
    extracted_data: Option<Vec<BenchmarkResult>>,
}

/// Search response body
#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchResultBody>,
}

/// API error surface. Internal detail never reaches the client; it is
/// logged where the error is converted.
#[derive(Debug)]
enum ApiError {
    NotReady,
    BadRequest(String),
    TextTooLong,
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) | ApiError::TextTooLong => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::NotReady => "Service is starting, please try again later".to_string(),
            ApiError::BadRequest(message) => message.clone(),
            ApiError::TextTooLong => "Input text is too long".to_string(),
            ApiError::Internal => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": self.message() });
        (status, Json(body)).into_response()
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Encoder(EncoderError::TextTooLong) => ApiError::TextTooLong,
            other => {
                tracing::error!(error = %other, "Search pipeline failed");
                ApiError::Internal
            }
        }
    }
}

#[derive(Clone, Copy)]
enum SearchMode {
    Sparse,
    Dense,
    Hybrid,
}

impl SearchMode {
    fn endpoint(self) -> &'static str {
        match self {
            SearchMode::Sparse => "sparse",
            SearchMode::Dense => "dense",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

async fn search_sparse(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    run_search(state, payload, SearchMode::Sparse).await
}

async fn search_dense(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    run_search(state, payload, SearchMode::Dense).await
}

async fn search_hybrid(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    run_search(state, payload, SearchMode::Hybrid).await
}

async fn run_search(
    state: AppState,
    payload: Result<Json<SearchRequest>, JsonRejection>,
    mode: SearchMode,
) -> Response {
    let started = Instant::now();
    let result = handle_search(&state, payload, mode).await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status(),
    };
    metrics::record_search(mode.endpoint(), status.as_u16());
    metrics::record_search_latency(mode.endpoint(), started.elapsed().as_secs_f64());

    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_search(
    state: &AppState,
    payload: Result<Json<SearchRequest>, JsonRejection>,
    mode: SearchMode,
) -> Result<SearchResponse, ApiError> {
    // Readiness first: before the loader finishes, every request gets a
    // 503 and nothing downstream runs.
    let context = state.search_context().ok_or(ApiError::NotReady)?;

    let Json(request) =
        payload.map_err(|_| ApiError::BadRequest("Query parameter is required".to_string()))?;
    let (query, k, extract) = validate_request(state, request)?;

    let docs = match mode {
        SearchMode::Sparse => context.retriever.search_sparse(&query, k).await,
        SearchMode::Dense => context.retriever.search_dense(&query, k).await,
        SearchMode::Hybrid => context.retriever.search_hybrid(&query, k).await,
    }?;

    let results = attach_extractions(&context, docs, extract).await;
    Ok(SearchResponse { results })
}

fn validate_request(
    state: &AppState,
    request: SearchRequest,
) -> Result<(String, usize, bool), ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".to_string()));
    }

    let retrieval = &state.settings.retrieval;
    let k = request.k.unwrap_or(retrieval.default_k);
    if k < 1 || k > retrieval.max_k {
        return Err(ApiError::BadRequest(format!(
            "k must be between 1 and {}",
            retrieval.max_k
        )));
    }

    Ok((request.query, k, request.extract.unwrap_or(false)))
}

/// Zip extraction slots onto the ranked list. Extraction failures have
/// already collapsed to `None` per document; retrieval results always come
/// through untouched.
async fn attach_extractions(
    context: &SearchContext,
    docs: Vec<ScoredDoc>,
    extract: bool,
) -> Vec<SearchResultBody> {
    let extractions: Vec<Option<Vec<BenchmarkResult>>> = if extract {
        match &context.extractor {
            Some(batch) => {
                let ids: Vec<String> = docs.iter().map(|d| d.document_id.clone()).collect();
                let slots = batch.extract_batch(&ids).await;
                for slot in &slots {
                    metrics::record_extraction(if slot.is_some() { "ok" } else { "null" });
                }
                slots
            }
            None => {
                tracing::debug!("Extraction requested but disabled in settings");
                vec![None; docs.len()]
            }
        }
    } else {
        vec![None; docs.len()]
    };

    docs.into_iter()
        .zip(extractions)
        .map(|(doc, extracted_data)| SearchResultBody {
            document_id: doc.document_id,
            score: doc.score,
            extracted_data,
        })
        .collect()
}

/// Liveness check
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check mirroring the gate the search endpoints apply
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    if state.is_ready() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "loading" })),
        )
    }
}
