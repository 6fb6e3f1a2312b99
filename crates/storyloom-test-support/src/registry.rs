//! Test registries — mock `TaskRegistry` implementations for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::registry::TaskRegistry;
use storyloom_core::task::{Task, TaskId, TaskKind, TaskUpdate};

/// A registry that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingTaskRegistry;

#[async_trait]
impl TaskRegistry for FailingTaskRegistry {
    async fn create(&self, _kind: TaskKind, _label: &str) -> Result<TaskId, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn get(&self, _ids: &[TaskId]) -> Result<HashMap<TaskId, Task>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn set_result(&self, _id: TaskId, _update: TaskUpdate) -> Result<Task, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// A registry that knows no tasks and counts how often it is queried.
#[derive(Debug, Default)]
pub struct CountingTaskRegistry {
    get_calls: AtomicUsize,
}

impl CountingTaskRegistry {
    /// Creates a registry with a zero call count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls received.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskRegistry for CountingTaskRegistry {
    async fn create(&self, _kind: TaskKind, _label: &str) -> Result<TaskId, DomainError> {
        Ok(TaskId::new())
    }

    async fn get(&self, _ids: &[TaskId]) -> Result<HashMap<TaskId, Task>, DomainError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(HashMap::new())
    }

    async fn set_result(&self, id: TaskId, _update: TaskUpdate) -> Result<Task, DomainError> {
        Err(DomainError::TaskNotFound(id))
    }
}
