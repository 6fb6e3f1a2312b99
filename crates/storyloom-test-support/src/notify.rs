//! Recording notifier — captures every notification for assertions.

use std::sync::Mutex;

use storyloom_core::notify::{Notification, NotificationLevel, Notifier};
use storyloom_core::task::TaskId;

/// A notifier that stores notifications instead of showing them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }

    /// Returns the notifications about `task_id` at `level`.
    pub fn for_task(&self, task_id: TaskId, level: NotificationLevel) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.task_id == task_id && n.level == level)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}
