//! Registry of the units of work the server can run, keyed by task kind.

use std::collections::HashMap;
use std::sync::Arc;

use storyloom_core::error::DomainError;
use storyloom_core::task::TaskKind;
use storyloom_core::work::WorkUnit;

/// Maps each task kind to the unit of work that executes it.
#[derive(Clone, Default)]
pub struct WorkCatalog {
    units: HashMap<TaskKind, Arc<dyn WorkUnit>>,
}

impl WorkCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `unit` for `kind`, replacing any previous registration.
    #[must_use]
    pub fn with(mut self, kind: TaskKind, unit: Arc<dyn WorkUnit>) -> Self {
        self.units.insert(kind, unit);
        self
    }

    /// Looks up the unit of work for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for `TaskKind::Unknown` and
    /// `DomainError::WorkUnavailable` when nothing is registered for `kind`.
    pub fn resolve(&self, kind: TaskKind) -> Result<Arc<dyn WorkUnit>, DomainError> {
        if kind == TaskKind::Unknown {
            return Err(DomainError::Validation("unknown task kind".into()));
        }
        self.units
            .get(&kind)
            .cloned()
            .ok_or(DomainError::WorkUnavailable(kind))
    }

    /// Kinds that currently have a unit of work registered.
    #[must_use]
    pub fn kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<TaskKind> = self.units.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl std::fmt::Debug for WorkCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}
