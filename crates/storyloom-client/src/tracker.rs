//! Task tracker: the client-side entry point for submitting and following
//! background tasks.

use std::sync::Arc;

use tracing::{info, warn};

use storyloom_core::error::DomainError;
use storyloom_core::notify::Notifier;
use storyloom_core::service::{SubmitRequest, TaskService};
use storyloom_core::task::TaskId;

use crate::dispatcher::{CallbackTable, CompletionCallback, CompletionDispatcher};
use crate::scheduler::{PollConfig, PollOutcome, PollScheduler};
use crate::snapshot::SnapshotSlot;
use crate::store::{ClientTaskRecord, ClientTaskStore, reconcile};
use crate::tracked::TrackedTasks;

/// Owns the tracked set, its snapshot, the callbacks and the poller.
pub struct TaskTracker {
    service: Arc<dyn TaskService>,
    tracked: Arc<TrackedTasks>,
    callbacks: Arc<CallbackTable>,
    store: ClientTaskStore,
    scheduler: PollScheduler,
}

impl TaskTracker {
    /// Creates a tracker with nothing tracked. Call [`TaskTracker::recover`]
    /// once at start-up to pick up tasks left unfinished by a previous run.
    #[must_use]
    pub fn new(
        service: Arc<dyn TaskService>,
        slot: Arc<dyn SnapshotSlot>,
        notifier: Arc<dyn Notifier>,
        config: PollConfig,
    ) -> Self {
        let tracked = Arc::new(TrackedTasks::new());
        let callbacks = Arc::new(CallbackTable::new());
        let store = ClientTaskStore::new(slot);
        let dispatcher = CompletionDispatcher::new(
            Arc::clone(&tracked),
            Arc::clone(&callbacks),
            store.clone(),
            notifier,
            config.orphan_after_misses,
        );
        let scheduler = PollScheduler::new(
            Arc::clone(&service),
            Arc::clone(&tracked),
            store.clone(),
            dispatcher,
            config.interval,
        );
        Self {
            service,
            tracked,
            callbacks,
            store,
            scheduler,
        }
    }

    /// Restores unfinished tasks from the snapshot and resumes polling.
    ///
    /// Tasks registered before recovery keep their in-memory state. Recovered
    /// tasks are not resubmitted. Returns how many tasks were recovered.
    pub async fn recover(&self) -> usize {
        let recovered = self.store.load().await;
        let fresh = self.tracked.to_map();
        let before = fresh.len();
        let merged = reconcile(fresh, recovered);
        let restored = merged.len() - before;

        self.tracked.adopt(merged.into_values());
        self.persist().await;
        if restored > 0 {
            info!(restored, "recovered unfinished tasks");
        }
        self.scheduler.ensure_running();
        restored
    }

    /// Submits work and starts tracking it.
    ///
    /// `on_complete`, if given, runs exactly once when the task finishes,
    /// fails, or is found to be unknown to the server. Callbacks do not
    /// survive a restart; recovered tasks only get a notification.
    ///
    /// # Errors
    ///
    /// Returns the service's error if the submission is rejected or cannot
    /// be sent. Nothing is tracked in that case.
    pub async fn submit(
        &self,
        request: SubmitRequest,
        on_complete: Option<CompletionCallback>,
    ) -> Result<TaskId, DomainError> {
        let kind = request.kind;
        let label = request.label.clone();
        let response = self.service.submit(request).await?;

        if let Some(callback) = on_complete {
            self.callbacks.register(response.task_id, callback);
        }
        self.track(ClientTaskRecord::pending(response.task_id, kind, label))
            .await;
        info!(task_id = %response.task_id, %kind, "task submitted");
        Ok(response.task_id)
    }

    /// Starts tracking a task that was submitted by other means.
    pub async fn track(&self, record: ClientTaskRecord) {
        self.tracked.insert(record);
        self.persist().await;
        self.scheduler.ensure_running();
    }

    /// Attaches a completion callback to a task that is already tracked,
    /// such as one restored by [`TaskTracker::recover`]. Returns `false`,
    /// dropping the callback, if `id` is not tracked.
    pub fn on_complete(&self, id: TaskId, callback: CompletionCallback) -> bool {
        if self.tracked.get(id).is_none() {
            return false;
        }
        self.callbacks.register(id, callback);
        true
    }

    /// Every task currently tracked.
    #[must_use]
    pub fn tracked(&self) -> Vec<ClientTaskRecord> {
        self.tracked.records()
    }

    /// Returns `true` while the polling loop is running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Polls once right away, without waiting for the next tick.
    pub async fn poll_now(&self) -> PollOutcome {
        self.scheduler.poll_once().await
    }

    /// Stops polling and writes the snapshot one last time. Tracked tasks
    /// stay in the snapshot for the next [`TaskTracker::recover`].
    pub async fn shutdown(&self) {
        self.scheduler.stop();
        self.persist().await;
    }

    /// Writes every tracked record into the snapshot. Records are read under
    /// the store's write lock, so a task finished meanwhile is never written
    /// back after its eviction.
    async fn persist(&self) {
        let tracked = &self.tracked;
        if let Err(e) = self.store.merge_with(|| tracked.records()).await {
            warn!(error = %e, "could not persist task snapshot");
        }
    }
}

impl std::fmt::Debug for TaskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTracker")
            .field("tracked", &self.tracked.len())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
