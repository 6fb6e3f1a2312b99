//! Shared helpers for client integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use storyloom_client::dispatcher::CompletionCallback;
use storyloom_client::error::ClientError;
use storyloom_client::scheduler::PollConfig;
use storyloom_client::snapshot::{MemorySnapshotSlot, SnapshotSlot};
use storyloom_client::tracker::TaskTracker;
use storyloom_core::service::SubmitRequest;
use storyloom_core::task::{TaskKind, TaskOutcome};
use storyloom_test_support::{RecordingNotifier, ScriptedTaskService};
use tokio::sync::Notify;

/// Poll interval used by scheduler-driven tests.
pub const INTERVAL: Duration = Duration::from_millis(500);

/// A tracker wired to scripted collaborators the test can inspect.
pub struct Harness {
    pub service: Arc<ScriptedTaskService>,
    pub slot: Arc<MemorySnapshotSlot>,
    pub notifier: Arc<RecordingNotifier>,
    pub tracker: TaskTracker,
}

/// Builds a tracker with a fresh server and an empty snapshot.
pub fn harness() -> Harness {
    harness_with(
        Arc::new(ScriptedTaskService::new()),
        Arc::new(MemorySnapshotSlot::new()),
    )
}

/// Builds a tracker over an existing server and snapshot, as a restarted
/// client would see them.
pub fn harness_with(service: Arc<ScriptedTaskService>, slot: Arc<MemorySnapshotSlot>) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let tracker = TaskTracker::new(
        service.clone(),
        slot.clone(),
        notifier.clone(),
        PollConfig {
            interval: INTERVAL,
            orphan_after_misses: 1,
        },
    );
    Harness {
        service,
        slot,
        notifier,
        tracker,
    }
}

/// An `analyze` submission for `label`.
pub fn analyze(label: &str) -> SubmitRequest {
    SubmitRequest {
        kind: TaskKind::Analyze,
        label: label.to_owned(),
        payload: json!({ "text": "Ada met Brand in Cairn." }),
    }
}

/// A completion callback that records every outcome it receives.
pub fn recording_callback() -> (CompletionCallback, Arc<Mutex<Vec<TaskOutcome>>>) {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = outcomes.clone();
    let callback: CompletionCallback = Box::new(move |outcome| {
        sink.lock().unwrap().push(outcome);
    });
    (callback, outcomes)
}

/// A snapshot slot that can hold one read open, after the contents were
/// read, until the test resumes it. Lets a test run another writer between
/// a read and the write that follows it.
#[derive(Debug, Default)]
pub struct PausingSlot {
    inner: MemorySnapshotSlot,
    reads_until_pause: Mutex<Option<usize>>,
    paused: Notify,
    resume: Notify,
}

impl PausingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds the `nth` read from now on, counting from 1.
    pub fn pause_on_read(&self, nth: usize) {
        *self.reads_until_pause.lock().unwrap() = Some(nth);
    }

    /// Resolves once a read is being held.
    pub async fn wait_until_paused(&self) {
        self.paused.notified().await;
    }

    /// Lets the held read return.
    pub fn resume(&self) {
        self.resume.notify_one();
    }
}

#[async_trait]
impl SnapshotSlot for PausingSlot {
    async fn read(&self) -> Result<Option<String>, ClientError> {
        let contents = self.inner.read().await?;
        let pause = {
            let mut remaining = self.reads_until_pause.lock().unwrap();
            match *remaining {
                Some(1) => {
                    *remaining = None;
                    true
                }
                Some(n) => {
                    *remaining = Some(n - 1);
                    false
                }
                None => false,
            }
        };
        if pause {
            self.paused.notify_one();
            self.resume.notified().await;
        }
        Ok(contents)
    }

    async fn write(&self, contents: &str) -> Result<(), ClientError> {
        self.inner.write(contents).await
    }
}
