//! User-facing notifications emitted when tracked tasks finish.

use crate::task::{TaskId, TaskKind};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// The work finished successfully.
    Success,
    /// The work failed or was lost.
    Error,
}

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Task the message is about.
    pub task_id: TaskId,
    /// Kind of the task.
    pub kind: TaskKind,
    /// Success or failure.
    pub level: NotificationLevel,
    /// Rendered message, including the task label.
    pub message: String,
}

/// Sink for notifications (toasts in a UI, log lines in a CLI).
pub trait Notifier: Send + Sync {
    /// Shows one notification.
    fn notify(&self, notification: Notification);
}
