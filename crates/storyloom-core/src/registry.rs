//! Task registry abstraction.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::DomainError;
use crate::task::{Task, TaskId, TaskKind, TaskUpdate};

/// Single source of truth for task outcomes.
///
/// Implementations replace whole records on every write so that a concurrent
/// reader never observes a partially written task.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Allocates a new identifier and stores the task as `pending`.
    async fn create(&self, kind: TaskKind, label: &str) -> Result<TaskId, DomainError>;

    /// Looks up the given ids. Ids not present are absent from the map,
    /// never synthesized.
    async fn get(&self, ids: &[TaskId]) -> Result<HashMap<TaskId, Task>, DomainError>;

    /// Replaces the state of `id` and returns the stored record.
    ///
    /// Returns `DomainError::TaskNotFound` for an unknown id and
    /// `DomainError::TerminalStateFinal` once the task is terminal.
    async fn set_result(&self, id: TaskId, update: TaskUpdate) -> Result<Task, DomainError>;
}
