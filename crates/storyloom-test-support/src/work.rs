//! Canned units of work for executor and API tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use storyloom_core::error::DomainError;
use storyloom_core::task::TaskProgress;
use storyloom_core::work::{ProgressReporter, WorkFailure, WorkUnit};
use tokio::sync::Notify;

/// Work that immediately returns a fixed payload.
#[derive(Debug, Clone)]
pub struct StaticWork(pub Value);

#[async_trait]
impl WorkUnit for StaticWork {
    async fn run(&self, _payload: Value, _progress: ProgressReporter) -> Result<Value, WorkFailure> {
        Ok(self.0.clone())
    }
}

/// Work that always fails with the given description.
#[derive(Debug, Clone)]
pub struct FailingWork(pub String);

#[async_trait]
impl WorkUnit for FailingWork {
    async fn run(&self, _payload: Value, _progress: ProgressReporter) -> Result<Value, WorkFailure> {
        Err(WorkFailure::Failed(self.0.clone()))
    }
}

/// Work that panics, for exercising the executor's panic capture.
#[derive(Debug, Clone, Copy)]
pub struct PanickingWork;

#[async_trait]
impl WorkUnit for PanickingWork {
    async fn run(&self, _payload: Value, _progress: ProgressReporter) -> Result<Value, WorkFailure> {
        panic!("model client exploded");
    }
}

/// Work that blocks until the test releases it, then echoes its payload.
///
/// Rejects payloads without a `"text"` field so tests can also exercise
/// submission-time validation.
#[derive(Debug, Default)]
pub struct GatedWork {
    release: Notify,
    started: AtomicUsize,
}

impl GatedWork {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets one waiting run finish. A release before the run starts is kept.
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Number of runs that have started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkUnit for GatedWork {
    fn validate(&self, payload: &Value) -> Result<(), DomainError> {
        if payload.get("text").is_none() {
            return Err(DomainError::Validation("text is required".into()));
        }
        Ok(())
    }

    async fn run(&self, payload: Value, _progress: ProgressReporter) -> Result<Value, WorkFailure> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(payload)
    }
}

/// Work that reports `steps` progress updates before completing.
#[derive(Debug, Clone, Copy)]
pub struct ProgressWork {
    /// Number of steps to report.
    pub steps: u32,
}

#[async_trait]
impl WorkUnit for ProgressWork {
    async fn run(&self, _payload: Value, progress: ProgressReporter) -> Result<Value, WorkFailure> {
        for step in 0..self.steps {
            progress
                .report(TaskProgress {
                    progress: step,
                    total: self.steps,
                    current: Some(format!("step {step}")),
                })
                .await
                .map_err(|e| WorkFailure::Failed(e.to_string()))?;
        }
        Ok(serde_json::json!({ "steps": self.steps }))
    }
}
