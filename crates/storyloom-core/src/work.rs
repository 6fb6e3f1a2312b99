//! Unit-of-work abstraction executed off the request path.
//!
//! The core never interprets payloads or results; a `WorkUnit` is the
//! opaque `(payload) -> result` function supplied by calling code.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::DomainError;
use crate::registry::TaskRegistry;
use crate::task::{Task, TaskId, TaskProgress, TaskUpdate};

/// Why a unit of work did not produce a result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkFailure {
    /// The work reported an error.
    #[error("{0}")]
    Failed(String),

    /// The work panicked.
    #[error("work panicked: {0}")]
    Panicked(String),
}

/// A long-running operation, such as a language-model call.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// Checks the input before a task id is allocated.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the missing or malformed input.
    fn validate(&self, _payload: &Value) -> Result<(), DomainError> {
        Ok(())
    }

    /// Runs the work to completion.
    async fn run(&self, payload: Value, progress: ProgressReporter) -> Result<Value, WorkFailure>;
}

/// Handle a running unit of work uses to publish progress for its task.
#[derive(Clone)]
pub struct ProgressReporter {
    task_id: TaskId,
    registry: Arc<dyn TaskRegistry>,
}

impl ProgressReporter {
    /// Creates a reporter writing to `registry` on behalf of `task_id`.
    #[must_use]
    pub fn new(task_id: TaskId, registry: Arc<dyn TaskRegistry>) -> Self {
        Self { task_id, registry }
    }

    /// The task this reporter writes to.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Publishes progress; the task stays `processing`.
    ///
    /// # Errors
    ///
    /// Returns the registry error, e.g. if the task was evicted.
    pub async fn report(&self, progress: TaskProgress) -> Result<Task, DomainError> {
        self.registry
            .set_result(self.task_id, TaskUpdate::Processing(Some(progress)))
            .await
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}
