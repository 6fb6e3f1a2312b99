//! Domain error types.

use thiserror::Error;

use crate::task::{TaskId, TaskKind};

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The registry holds no task with this identifier.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A write targeted a task that already reached `completed` or `error`.
    #[error("task {0} already reached a terminal state")]
    TerminalStateFinal(TaskId),

    /// Submitted input was rejected before any task was allocated.
    #[error("validation error: {0}")]
    Validation(String),

    /// No unit of work is registered for the requested kind.
    #[error("no worker is available for task kind '{0}'")]
    WorkUnavailable(TaskKind),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
