//! Shared application state.

use std::sync::Arc;

use storyloom_core::registry::TaskRegistry;
use storyloom_tasks::application::executor::TaskExecutor;
use storyloom_tasks::domain::catalog::WorkCatalog;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative task records.
    pub registry: Arc<dyn TaskRegistry>,
    /// Work units by task kind.
    pub catalog: WorkCatalog,
    /// Runs submitted work in the background.
    pub executor: TaskExecutor,
}

impl AppState {
    /// Create new application state; the executor writes to `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn TaskRegistry>, catalog: WorkCatalog) -> Self {
        let executor = TaskExecutor::new(Arc::clone(&registry));
        Self {
            registry,
            catalog,
            executor,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
