//! Poll scheduler: at most one polling loop per client, running only while
//! some tracked task is unfinished.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use storyloom_core::service::TaskService;

use crate::dispatcher::{CompletionDispatcher, DispatchSummary};
use crate::store::ClientTaskStore;
use crate::tracked::TrackedTasks;

/// Default delay between two status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polling behaviour of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status queries.
    pub interval: Duration,
    /// Consecutive responses that must omit a task before it is treated as
    /// lost by the server.
    pub orphan_after_misses: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            orphan_after_misses: 1,
        }
    }
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was unfinished; no query was sent.
    Idle,
    /// The query failed; the same tasks will be asked about next time.
    Failed,
    /// The response was applied.
    Dispatched(DispatchSummary),
}

struct PollerInner {
    service: Arc<dyn TaskService>,
    tracked: Arc<TrackedTasks>,
    store: ClientTaskStore,
    dispatcher: CompletionDispatcher,
    interval: Duration,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollerInner {
    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn poll_once(&self) -> PollOutcome {
        // Another client sharing the snapshot may have registered tasks.
        let adopted = self.tracked.adopt(self.store.load().await.into_values());
        if adopted > 0 {
            debug!(adopted, "picked up tasks from snapshot");
        }

        let ids = self.tracked.active_ids();
        if ids.is_empty() {
            return PollOutcome::Idle;
        }

        match self.service.query_statuses(&ids).await {
            Ok(entries) => {
                let summary = self.dispatcher.dispatch(&ids, entries).await;
                debug!(queried = ids.len(), ?summary, "status poll applied");
                PollOutcome::Dispatched(summary)
            }
            Err(e) => {
                warn!(error = %e, queried = ids.len(), "status poll failed; retrying next tick");
                PollOutcome::Failed
            }
        }
    }
}

async fn run_loop(inner: Arc<PollerInner>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + inner.interval, inner.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        inner.poll_once().await;

        // Checked under the slot lock so a concurrent `ensure_running` either
        // sees this loop still registered or finds the slot empty.
        let mut slot = inner.slot();
        if !inner.tracked.has_active() {
            *slot = None;
            info!("no unfinished tasks; polling stopped");
            return;
        }
    }
}

/// Starts and stops the polling loop.
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<PollerInner>,
}

impl PollScheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new(
        service: Arc<dyn TaskService>,
        tracked: Arc<TrackedTasks>,
        store: ClientTaskStore,
        dispatcher: CompletionDispatcher,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                service,
                tracked,
                store,
                dispatcher,
                interval,
                loop_handle: Mutex::new(None),
            }),
        }
    }

    /// Starts the polling loop if it is not running and something is
    /// unfinished. Returns `true` if a loop was started.
    ///
    /// Must be called from within a tokio runtime; outside one it logs a
    /// warning and starts nothing.
    pub fn ensure_running(&self) -> bool {
        let mut slot = self.inner.slot();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        if !self.inner.tracked.has_active() {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available; polling not started");
            return false;
        };

        let inner = Arc::clone(&self.inner);
        *slot = Some(runtime.spawn(run_loop(inner)));
        info!(interval_ms = self.inner.interval.as_millis(), "polling started");
        true
    }

    /// Returns `true` while the polling loop is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Runs one poll immediately, independent of the loop.
    pub async fn poll_once(&self) -> PollOutcome {
        self.inner.poll_once().await
    }

    /// Aborts the polling loop, if any.
    pub fn stop(&self) {
        if let Some(handle) = self.inner.slot().take() {
            handle.abort();
            info!("polling stopped");
        }
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("interval", &self.inner.interval)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_core::task::{TaskId, TaskKind, TaskStatus};
    use storyloom_test_support::{RecordingNotifier, ScriptedTaskService};

    use crate::dispatcher::CallbackTable;
    use crate::snapshot::MemorySnapshotSlot;
    use crate::store::ClientTaskRecord;

    const INTERVAL: Duration = Duration::from_millis(100);

    struct Fixture {
        service: Arc<ScriptedTaskService>,
        tracked: Arc<TrackedTasks>,
        scheduler: PollScheduler,
    }

    fn fixture() -> Fixture {
        let service = Arc::new(ScriptedTaskService::new());
        let tracked = Arc::new(TrackedTasks::new());
        let store = ClientTaskStore::new(Arc::new(MemorySnapshotSlot::new()));
        let dispatcher = CompletionDispatcher::new(
            tracked.clone(),
            Arc::new(CallbackTable::new()),
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            1,
        );
        let scheduler =
            PollScheduler::new(service.clone(), tracked.clone(), store, dispatcher, INTERVAL);
        Fixture {
            service,
            tracked,
            scheduler,
        }
    }

    fn track_pending(f: &Fixture) -> TaskId {
        let id = TaskId::new();
        f.service.set_status(id, TaskStatus::Pending, None);
        f.tracked
            .insert(ClientTaskRecord::pending(id, TaskKind::Analyze, "story"));
        id
    }

    #[tokio::test]
    async fn test_poll_with_nothing_tracked_sends_no_query() {
        let f = fixture();

        let outcome = f.scheduler.poll_once().await;

        assert_eq!(outcome, PollOutcome::Idle);
        assert_eq!(f.service.query_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_running_does_nothing_when_idle() {
        let f = fixture();

        assert!(!f.scheduler.ensure_running());
        assert!(!f.scheduler.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_loop_runs_at_a_time() {
        // Arrange
        let f = fixture();
        track_pending(&f);
        track_pending(&f);

        // Act
        let first = f.scheduler.ensure_running();
        let second = f.scheduler.ensure_running();
        tokio::time::sleep(INTERVAL * 3 + INTERVAL / 2).await;

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(f.service.query_count(), 3);
        assert!(f.service.query_log().iter().all(|ids| ids.len() == 2));
        f.scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_once_everything_finished() {
        // Arrange
        let f = fixture();
        let id = track_pending(&f);
        f.scheduler.ensure_running();

        // Act
        f.service.set_status(id, TaskStatus::Completed, None);
        tokio::time::sleep(INTERVAL + INTERVAL / 2).await;
        tokio::task::yield_now().await;

        // Assert
        assert!(!f.scheduler.is_active());
        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(f.service.query_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_loop_alive() {
        let f = fixture();
        let id = track_pending(&f);
        f.service.fail_next_queries(2);
        f.scheduler.ensure_running();

        tokio::time::sleep(INTERVAL * 3 + INTERVAL / 2).await;

        assert_eq!(f.service.query_count(), 3);
        assert!(f.service.query_log().iter().all(|ids| ids == &vec![id]));
        assert!(f.scheduler.is_active());
        f.scheduler.stop();
        assert!(!f.scheduler.is_active());
    }
}
