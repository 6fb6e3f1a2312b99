//! The client's view of the server's task interfaces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;
use crate::task::{TaskId, TaskKind, TaskStatus, TaskStatusEntry};

/// Body of a task submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Kind of work to run.
    pub kind: TaskKind,
    /// Label shown to the user in notifications.
    pub label: String,
    /// Input handed to the unit of work.
    #[serde(default)]
    pub payload: Value,
}

/// Response to a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// The freshly allocated task id.
    pub task_id: TaskId,
    /// Status at the time of the response, normally `pending`.
    pub status: TaskStatus,
}

/// Body of a batched status query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusQueryRequest {
    /// Ids to look up.
    pub ids: Vec<TaskId>,
}

/// Response to a batched status query. Unknown ids are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusQueryResponse {
    /// One entry per id still known to the server.
    pub tasks: Vec<TaskStatusEntry>,
}

/// Remote task service: submission plus batched status queries.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Submits work and returns its id before the work completes.
    async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, DomainError>;

    /// Asks for the state of every id in one request.
    async fn query_statuses(&self, ids: &[TaskId]) -> Result<Vec<TaskStatusEntry>, DomainError>;
}
