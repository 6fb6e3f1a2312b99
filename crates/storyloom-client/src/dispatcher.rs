//! Completion dispatcher: turns status responses into callbacks,
//! notifications and snapshot evictions.

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, warn};

use storyloom_core::notify::Notifier;
use storyloom_core::task::{TaskId, TaskOutcome, TaskStatusEntry};

use crate::notify::render;
use crate::store::ClientTaskStore;
use crate::tracked::TrackedTasks;

/// Error description given to tasks the server no longer knows.
pub const ORPHAN_MESSAGE: &str = "the server no longer knows this task; it may have restarted";

/// One-shot callback fired when a task reaches a terminal state.
pub type CompletionCallback = Box<dyn FnOnce(TaskOutcome) + Send + 'static>;

/// Side table of completion callbacks, kept apart from task status so that
/// snapshots never carry executable code.
#[derive(Default)]
pub struct CallbackTable {
    callbacks: Mutex<HashMap<TaskId, CompletionCallback>>,
}

impl CallbackTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `id`, replacing any previous one.
    pub fn register(&self, id: TaskId, callback: CompletionCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);
    }

    /// Removes and returns the callback for `id`.
    pub fn take(&self, id: TaskId) -> Option<CompletionCallback> {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Number of callbacks still waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no callback is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackTable")
            .field("len", &self.len())
            .finish()
    }
}

/// Counts of what one dispatch pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Tasks resolved as completed.
    pub completed: usize,
    /// Tasks resolved as failed by the server.
    pub failed: usize,
    /// Tasks resolved as orphans.
    pub orphaned: usize,
    /// Non-terminal records that changed.
    pub updated: usize,
}

/// Applies status responses to the tracked set.
pub struct CompletionDispatcher {
    tracked: Arc<TrackedTasks>,
    callbacks: Arc<CallbackTable>,
    store: ClientTaskStore,
    notifier: Arc<dyn Notifier>,
    orphan_after_misses: u32,
}

impl CompletionDispatcher {
    /// Creates a dispatcher. A tracked task omitted from
    /// `orphan_after_misses` consecutive responses is resolved as an orphan.
    #[must_use]
    pub fn new(
        tracked: Arc<TrackedTasks>,
        callbacks: Arc<CallbackTable>,
        store: ClientTaskStore,
        notifier: Arc<dyn Notifier>,
        orphan_after_misses: u32,
    ) -> Self {
        Self {
            tracked,
            callbacks,
            store,
            notifier,
            orphan_after_misses: orphan_after_misses.max(1),
        }
    }

    /// Handles the response to a status query for `queried`.
    pub async fn dispatch(&self, queried: &[TaskId], entries: Vec<TaskStatusEntry>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let reported: HashSet<TaskId> = entries.iter().map(|e| e.id).collect();

        for entry in entries {
            match entry.outcome() {
                Some(outcome) => {
                    let success = outcome.is_success();
                    if self.finish(entry.id, outcome).await {
                        if success {
                            summary.completed += 1;
                        } else {
                            summary.failed += 1;
                        }
                    }
                }
                None => {
                    if self.tracked.observe(entry.id, entry.status, entry.progress) {
                        summary.updated += 1;
                    }
                }
            }
        }

        for id in queried.iter().filter(|id| !reported.contains(id)) {
            let Some(misses) = self.tracked.record_miss(*id) else {
                continue;
            };
            if misses < self.orphan_after_misses {
                debug!(task_id = %id, misses, "tracked task missing from status response");
                continue;
            }
            warn!(task_id = %id, "tracked task unknown to the server; resolving as orphan");
            if self
                .finish(*id, TaskOutcome::Failed(ORPHAN_MESSAGE.to_owned()))
                .await
            {
                summary.orphaned += 1;
            }
        }

        if summary.updated > 0 {
            let tracked = &self.tracked;
            if let Err(e) = self.store.merge_with(|| tracked.records()).await {
                warn!(error = %e, "could not persist task snapshot");
            }
        }

        summary
    }

    /// Runs terminal handling for `id`. Returns `false` if the task was not
    /// tracked, which is how repeated terminal observations are absorbed.
    async fn finish(&self, id: TaskId, outcome: TaskOutcome) -> bool {
        let Some(record) = self.tracked.take(id) else {
            return false;
        };

        if let Err(e) = self.store.evict(id).await {
            warn!(task_id = %id, error = %e, "could not evict finished task from snapshot");
        }

        if let Some(callback) = self.callbacks.take(id) {
            let delivered = outcome.clone();
            if catch_unwind(AssertUnwindSafe(move || callback(delivered))).is_err() {
                error!(task_id = %id, "completion callback panicked");
            }
        }

        self.notifier
            .notify(render(id, record.kind, &record.label, &outcome));
        true
    }
}

impl std::fmt::Debug for CompletionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionDispatcher")
            .field("orphan_after_misses", &self.orphan_after_misses)
            .finish_non_exhaustive()
    }
}
