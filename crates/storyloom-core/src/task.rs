//! Task model shared by the registry, the executor and the polling client.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DomainError;

/// Opaque task identifier, allocated once per submission and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a task.
///
/// The only legal sequences are prefixes of
/// `pending -> processing* -> (completed | error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Allocated, work not yet started.
    Pending,
    /// Work is running; may carry progress.
    Processing,
    /// Work finished and produced a payload.
    Completed,
    /// Work failed, or the task was lost.
    Error,
}

impl TaskStatus {
    /// Returns `true` for `completed` and `error`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Position in the lifecycle; observed statuses never decrease in rank.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Error => 2,
        }
    }

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of long-running work the application submits.
///
/// Unrecognised kind strings decode to [`TaskKind::Unknown`] rather than
/// failing, so a newer server never breaks an older client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Drafting a world or story description.
    GenerateDescription,
    /// Extracting characters and locations from one text.
    Analyze,
    /// Analysing several stories of a world in chronological order.
    BatchAnalyze,
    /// Extracting timeline events from stories.
    ExtractEvents,
    /// Any kind this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl TaskKind {
    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateDescription => "generate-description",
            Self::Analyze => "analyze",
            Self::BatchAnalyze => "batch-analyze",
            Self::ExtractEvents => "extract-events",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable name of the work, used in notifications.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::GenerateDescription => "Description",
            Self::Analyze => "Analysis",
            Self::BatchAnalyze => "Batch analysis",
            Self::ExtractEvents => "Event extraction",
            Self::Unknown => "Task",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "generate-description" => Self::GenerateDescription,
            "analyze" => Self::Analyze,
            "batch-analyze" => Self::BatchAnalyze,
            "extract-events" => Self::ExtractEvents,
            _ => Self::Unknown,
        })
    }
}

/// Progress reported by a unit of work while it is processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Number of steps finished.
    pub progress: u32,
    /// Total number of steps.
    pub total: u32,
    /// Label of the step currently running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

/// Server-side state of a task. Results exist only in terminal states.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// Waiting for the executor to start.
    Pending,
    /// Running, optionally with progress.
    Processing(Option<TaskProgress>),
    /// Finished with a success payload.
    Completed(Value),
    /// Finished with an error description.
    Error(String),
}

impl TaskState {
    /// The status this state corresponds to.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Processing(_) => TaskStatus::Processing,
            Self::Completed(_) => TaskStatus::Completed,
            Self::Error(_) => TaskStatus::Error,
        }
    }
}

/// A write the executor performs against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    /// Mark the task as running, optionally with fresh progress.
    Processing(Option<TaskProgress>),
    /// Store the success payload.
    Completed(Value),
    /// Store the failure description.
    Error(String),
}

/// Authoritative server-held task record.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Kind of work, passed through untouched.
    pub kind: TaskKind,
    /// Caller-supplied label, passed through untouched.
    pub label: String,
    /// Current state.
    pub state: TaskState,
    /// When the task was allocated.
    pub created_at: DateTime<Utc>,
    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a `pending` task.
    #[must_use]
    pub fn new(id: TaskId, kind: TaskKind, label: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            state: TaskState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    /// Returns `true` once the task has completed or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Builds the replacement record produced by `update`.
    ///
    /// A processing update without progress keeps the last reported progress.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TerminalStateFinal` if the task is already terminal.
    pub fn with_update(&self, update: TaskUpdate, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.is_terminal() {
            return Err(DomainError::TerminalStateFinal(self.id));
        }

        let state = match update {
            TaskUpdate::Processing(Some(progress)) => TaskState::Processing(Some(progress)),
            TaskUpdate::Processing(None) => match &self.state {
                TaskState::Processing(previous) => TaskState::Processing(previous.clone()),
                _ => TaskState::Processing(None),
            },
            TaskUpdate::Completed(payload) => TaskState::Completed(payload),
            TaskUpdate::Error(description) => TaskState::Error(description),
        };

        Ok(Self {
            state,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Projects the record onto the status-query wire entry.
    #[must_use]
    pub fn to_status_entry(&self) -> TaskStatusEntry {
        let (result, progress) = match &self.state {
            TaskState::Pending => (None, None),
            TaskState::Processing(progress) => (None, progress.clone()),
            TaskState::Completed(payload) => (Some(payload.clone()), None),
            TaskState::Error(description) => (Some(Value::String(description.clone())), None),
        };
        TaskStatusEntry {
            id: self.id,
            status: self.status(),
            result,
            progress,
        }
    }
}

/// Terminal result of a task as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The work produced this payload.
    Completed(Value),
    /// The work failed, or the task was lost, for this reason.
    Failed(String),
}

impl TaskOutcome {
    /// Returns `true` for successful outcomes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// One entry of a status query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusEntry {
    /// Task identifier.
    pub id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Payload or error description, present only in terminal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Latest progress while processing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgress>,
}

impl TaskStatusEntry {
    /// The terminal outcome carried by this entry, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<TaskOutcome> {
        match self.status {
            TaskStatus::Pending | TaskStatus::Processing => None,
            TaskStatus::Completed => Some(TaskOutcome::Completed(
                self.result.clone().unwrap_or(Value::Null),
            )),
            TaskStatus::Error => Some(TaskOutcome::Failed(match &self.result {
                Some(Value::String(description)) => description.clone(),
                Some(other) => other.to_string(),
                None => "unknown error".to_owned(),
            })),
        }
    }
}
