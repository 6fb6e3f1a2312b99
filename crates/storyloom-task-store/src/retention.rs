//! Retention policy for finished tasks.
//!
//! The registry never deletes tasks on its own. A periodic sweep applies a
//! `RetentionPolicy`, which only ever removes terminal tasks; a task that is
//! still pending or processing stays until it finishes.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use storyloom_core::task::{Task, TaskId};

/// Bounds on how long, and how many, finished tasks are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Terminal tasks last updated longer ago than this are evicted.
    pub max_age: Duration,
    /// Above this many records, the oldest terminal tasks are evicted first.
    pub max_entries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            max_entries: 10_000,
        }
    }
}

impl RetentionPolicy {
    /// Chooses which tasks to evict at `now`.
    #[must_use]
    pub fn select_evictions(&self, tasks: &HashMap<TaskId, Task>, now: DateTime<Utc>) -> Vec<TaskId> {
        let max_age = TimeDelta::from_std(self.max_age).unwrap_or(TimeDelta::MAX);

        let mut terminal: Vec<&Task> = tasks.values().filter(|t| t.is_terminal()).collect();
        terminal.sort_by_key(|t| (t.updated_at, t.id));

        let (expired, survivors): (Vec<&Task>, Vec<&Task>) = terminal
            .into_iter()
            .partition(|t| now.signed_duration_since(t.updated_at) > max_age);

        let mut evicted: Vec<TaskId> = expired.iter().map(|t| t.id).collect();

        let remaining = tasks.len() - evicted.len();
        let overflow = remaining.saturating_sub(self.max_entries);
        evicted.extend(survivors.iter().take(overflow).map(|t| t.id));

        evicted
    }
}
