//! Prometheus metrics
//!
//! Installs the global recorder once at startup; the handle renders the
//! scrape body for `GET /metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Safe to call more than once; only the
/// first call installs.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .map_err(|e| tracing::warn!(error = %e, "Failed to install metrics recorder"))
        .ok()
}

/// Render the current metrics snapshot
pub async fn metrics_handler() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Count one search request by endpoint and response status
pub fn record_search(endpoint: &'static str, status: u16) {
    counter!(
        "paperdex_search_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record end-to-end search latency in seconds
pub fn record_search_latency(endpoint: &'static str, seconds: f64) {
    histogram!("paperdex_search_duration_seconds", "endpoint" => endpoint).record(seconds);
}

/// Count extraction slots by outcome ("ok" or "null")
pub fn record_extraction(outcome: &'static str) {
    counter!("paperdex_extraction_documents_total", "outcome" => outcome).increment(1);
}
