//! Notification rendering and the default log-based notifier.

use tracing::{info, warn};

use storyloom_core::notify::{Notification, NotificationLevel, Notifier};
use storyloom_core::task::{TaskId, TaskKind, TaskOutcome};

/// Builds the user-facing notification for a finished task.
#[must_use]
pub fn render(task_id: TaskId, kind: TaskKind, label: &str, outcome: &TaskOutcome) -> Notification {
    let (level, message) = match outcome {
        TaskOutcome::Completed(_) => (
            NotificationLevel::Success,
            format!("{} finished: {label}", kind.display_name()),
        ),
        TaskOutcome::Failed(cause) => (
            NotificationLevel::Error,
            format!("{} failed: {label} ({cause})", kind.display_name()),
        ),
    };
    Notification {
        task_id,
        kind,
        level,
        message,
    }
}

/// Notifier that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                info!(task_id = %notification.task_id, "{}", notification.message);
            }
            NotificationLevel::Error => {
                warn!(task_id = %notification.task_id, "{}", notification.message);
            }
        }
    }
}
