//! In-memory implementation of the `TaskRegistry` trait.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, error, info};

use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::registry::TaskRegistry;
use storyloom_core::task::{Task, TaskId, TaskKind, TaskUpdate};

use crate::retention::RetentionPolicy;

/// Process-local task registry.
///
/// Records are replaced wholesale under a write lock that is held only for
/// the map operation, so readers see either the old or the new record.
/// Every write is serialized globally.
pub struct InMemoryTaskRegistry {
    tasks: RwLock<HashMap<TaskId, Task>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskRegistry {
    /// Creates an empty registry stamping records with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts finished tasks according to `policy` and returns how many
    /// were removed. Pending and processing tasks are never touched.
    pub fn sweep(&self, policy: &RetentionPolicy) -> usize {
        let now = self.clock.now();
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = policy.select_evictions(&tasks, now);
        for id in &evicted {
            tasks.remove(id);
        }
        if !evicted.is_empty() {
            info!(evicted = evicted.len(), remaining = tasks.len(), "retention sweep evicted tasks");
        }
        evicted.len()
    }
}

impl std::fmt::Debug for InMemoryTaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTaskRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TaskRegistry for InMemoryTaskRegistry {
    async fn create(&self, kind: TaskKind, label: &str) -> Result<TaskId, DomainError> {
        let now = self.clock.now();
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);

        let mut id = TaskId::new();
        while tasks.contains_key(&id) {
            id = TaskId::new();
        }
        tasks.insert(id, Task::new(id, kind, label, now));

        debug!(task_id = %id, %kind, "task registered");
        Ok(id)
    }

    async fn get(&self, ids: &[TaskId]) -> Result<HashMap<TaskId, Task>, DomainError> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        Ok(ids
            .iter()
            .filter_map(|id| tasks.get(id).map(|task| (*id, task.clone())))
            .collect())
    }

    async fn set_result(&self, id: TaskId, update: TaskUpdate) -> Result<Task, DomainError> {
        let now = self.clock.now();
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);

        let Some(current) = tasks.get(&id) else {
            error!(task_id = %id, "result written for a task the registry does not hold");
            return Err(DomainError::TaskNotFound(id));
        };

        let replacement = current.with_update(update, now).inspect_err(|_| {
            error!(task_id = %id, status = %current.status(), "write rejected: task is already terminal");
        })?;

        tasks.insert(id, replacement.clone());
        Ok(replacement)
    }
}
