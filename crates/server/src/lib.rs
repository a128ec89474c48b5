//! Paperdex Server
//!
//! HTTP surface, resource bootstrap, and readiness gating for the hybrid
//! retrieval service.

pub mod http;
pub mod loader;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use loader::{bootstrap, LoaderError};
pub use metrics::init_metrics;
pub use state::{AppState, SearchContext};
