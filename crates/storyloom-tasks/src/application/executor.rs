//! Task executor: runs one unit of work per task, detached from the request
//! that submitted it, and records the outcome exactly once.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use storyloom_core::registry::TaskRegistry;
use storyloom_core::task::{TaskId, TaskUpdate};
use storyloom_core::work::{ProgressReporter, WorkFailure, WorkUnit};

/// Spawns task executions on the tokio runtime.
#[derive(Clone)]
pub struct TaskExecutor {
    registry: Arc<dyn TaskRegistry>,
}

impl TaskExecutor {
    /// Creates an executor writing outcomes to `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn TaskRegistry>) -> Self {
        Self { registry }
    }

    /// Starts `work` for `task_id` and returns immediately.
    ///
    /// The returned handle is only useful to tests; dropping it does not
    /// cancel the work.
    pub fn spawn(&self, task_id: TaskId, work: Arc<dyn WorkUnit>, payload: Value) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(
            execute(task_id, work, payload, registry).instrument(info_span!("task", task_id = %task_id)),
        )
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor").finish_non_exhaustive()
    }
}

async fn execute(
    task_id: TaskId,
    work: Arc<dyn WorkUnit>,
    payload: Value,
    registry: Arc<dyn TaskRegistry>,
) {
    if let Err(e) = registry
        .set_result(task_id, TaskUpdate::Processing(None))
        .await
    {
        error!(error = %e, "could not mark task as processing; abandoning execution");
        return;
    }
    info!("task execution started");

    let progress = ProgressReporter::new(task_id, Arc::clone(&registry));

    // The work runs on its own tokio task so a panic surfaces as a JoinError
    // here instead of unwinding through the executor.
    let run = tokio::spawn(async move { work.run(payload, progress).await });

    let update = match run.await {
        Ok(Ok(result)) => {
            info!("task execution completed");
            TaskUpdate::Completed(result)
        }
        Ok(Err(failure)) => {
            warn!(error = %failure, "task execution failed");
            TaskUpdate::Error(failure.to_string())
        }
        Err(join_error) if join_error.is_panic() => {
            let failure = WorkFailure::Panicked(panic_message(join_error.into_panic().as_ref()));
            error!(error = %failure, "task execution panicked");
            TaskUpdate::Error(failure.to_string())
        }
        Err(join_error) => {
            warn!(error = %join_error, "task execution was cancelled");
            TaskUpdate::Error(format!("work was cancelled: {join_error}"))
        }
    };

    if let Err(e) = registry.set_result(task_id, update).await {
        error!(error = %e, "could not record task outcome");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
