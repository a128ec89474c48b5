//! Application state
//!
//! Shared state across all handlers. The loaded search machinery is
//! published once through a `OnceCell`: `get` is the lock-free readiness
//! read the handlers take on every request, `set` is the loader's single
//! false-to-true transition.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use paperdex_config::Settings;
use paperdex_extraction::BatchExtractor;
use paperdex_retrieval::HybridRetriever;

/// Everything a request needs once the service is ready.
///
/// Built by the loader, immutable afterwards; handlers only ever see it
/// behind an `Arc`.
pub struct SearchContext {
    pub retriever: HybridRetriever,
    /// Present only when extraction is enabled in settings
    pub extractor: Option<BatchExtractor>,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    search: Arc<OnceCell<Arc<SearchContext>>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            search: Arc::new(OnceCell::new()),
        }
    }

    /// The loaded search context, or `None` while the loader is running
    pub fn search_context(&self) -> Option<Arc<SearchContext>> {
        self.search.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.search.get().is_some()
    }

    /// Publish the loaded context. May succeed at most once per process;
    /// a second call is a programming error and is reported, not applied.
    pub fn publish(&self, context: SearchContext) {
        if self.search.set(Arc::new(context)).is_err() {
            tracing::error!("Search context published twice; keeping the first");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_until_published() {
        let state = AppState::new(Settings::default());
        assert!(!state.is_ready());
        assert!(state.search_context().is_none());
    }
}
