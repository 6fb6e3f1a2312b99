//! In-memory set of tasks the client is tracking.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use storyloom_core::task::{TaskId, TaskProgress, TaskStatus};

use crate::store::ClientTaskRecord;

#[derive(Debug)]
struct Entry {
    record: ClientTaskRecord,
    misses: u32,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<TaskId, Entry>,
    resolved: HashSet<TaskId>,
}

/// Tracked tasks plus, per task, how many consecutive status responses
/// have omitted it.
///
/// Ids that went through [`TrackedTasks::take`] are remembered for the
/// lifetime of the set and are never adopted again, even if a stale
/// snapshot still lists them.
#[derive(Debug, Default)]
pub struct TrackedTasks {
    state: Mutex<State>,
}

impl TrackedTasks {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `record`, replacing any record with the same id.
    pub fn insert(&self, record: ClientTaskRecord) {
        self.lock()
            .entries
            .insert(record.id, Entry { record, misses: 0 });
    }

    /// Adds records that are neither tracked nor already resolved, and
    /// returns how many were added. Records already tracked keep their
    /// in-memory state.
    pub fn adopt(&self, records: impl IntoIterator<Item = ClientTaskRecord>) -> usize {
        let mut state = self.lock();
        let State { entries, resolved } = &mut *state;
        let mut added = 0;
        for record in records {
            if resolved.contains(&record.id) {
                continue;
            }
            entries.entry(record.id).or_insert_with(|| {
                added += 1;
                Entry { record, misses: 0 }
            });
        }
        added
    }

    /// Snapshot of every tracked record.
    #[must_use]
    pub fn records(&self) -> Vec<ClientTaskRecord> {
        self.lock()
            .entries
            .values()
            .map(|e| e.record.clone())
            .collect()
    }

    /// Snapshot of every tracked record, keyed by id.
    #[must_use]
    pub fn to_map(&self) -> HashMap<TaskId, ClientTaskRecord> {
        self.lock()
            .entries
            .iter()
            .map(|(id, e)| (*id, e.record.clone()))
            .collect()
    }

    /// Looks up one record.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<ClientTaskRecord> {
        self.lock().entries.get(&id).map(|e| e.record.clone())
    }

    /// Ids of tracked tasks that are not yet terminal, in a stable order.
    #[must_use]
    pub fn active_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .lock()
            .entries
            .values()
            .filter(|e| !e.record.status.is_terminal())
            .map(|e| e.record.id)
            .collect();
        ids.sort();
        ids
    }

    /// Returns `true` while any tracked task is non-terminal.
    #[must_use]
    pub fn has_active(&self) -> bool {
        self.lock()
            .entries
            .values()
            .any(|e| !e.record.status.is_terminal())
    }

    /// Records a non-terminal status seen in a response.
    ///
    /// Statuses never move backwards: an observation ranked below the
    /// current one is ignored. Returns `true` if the record changed.
    pub fn observe(&self, id: TaskId, status: TaskStatus, progress: Option<TaskProgress>) -> bool {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(&id) else {
            return false;
        };
        entry.misses = 0;
        if status.rank() < entry.record.status.rank() {
            return false;
        }
        let progress = progress.or_else(|| entry.record.progress.clone());
        let changed = entry.record.status != status || entry.record.progress != progress;
        entry.record.status = status;
        entry.record.progress = progress;
        changed
    }

    /// Counts one more response that omitted `id` and returns the running
    /// total, or `None` if `id` is not tracked.
    pub fn record_miss(&self, id: TaskId) -> Option<u32> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(&id)?;
        entry.misses += 1;
        Some(entry.misses)
    }

    /// Stops tracking `id` and returns its record.
    ///
    /// Only the first caller for a given id gets `Some`; this is the step
    /// that makes terminal handling happen once per task.
    pub fn take(&self, id: TaskId) -> Option<ClientTaskRecord> {
        let mut state = self.lock();
        let record = state.entries.remove(&id).map(|e| e.record)?;
        state.resolved.insert(id);
        Some(record)
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
