//! Commands for task orchestration.

use serde_json::Value;
use storyloom_core::task::TaskKind;
use uuid::Uuid;

/// Command to submit a unit of work for background execution.
#[derive(Debug, Clone)]
pub struct SubmitTask {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Kind of work to run.
    pub kind: TaskKind,
    /// Label shown to the user when the task finishes.
    pub label: String,
    /// Input handed to the unit of work.
    pub payload: Value,
}
