//! Scripted task service — an in-memory stand-in for the HTTP task API.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use storyloom_core::error::DomainError;
use storyloom_core::service::{SubmitRequest, SubmitResponse, TaskService};
use storyloom_core::task::{TaskId, TaskStatus, TaskStatusEntry};

/// A task service whose server-side state is driven by the test.
///
/// Submissions allocate a `pending` entry. Tests then move entries through
/// the lifecycle with [`ScriptedTaskService::set_status`], drop them with
/// [`ScriptedTaskService::forget`] to simulate a server restart, or make the
/// next queries fail with [`ScriptedTaskService::fail_next_queries`].
#[derive(Debug, Default)]
pub struct ScriptedTaskService {
    server: Mutex<HashMap<TaskId, TaskStatusEntry>>,
    queries: Mutex<Vec<Vec<TaskId>>>,
    submissions: Mutex<Vec<SubmitRequest>>,
    failures_remaining: Mutex<usize>,
}

impl ScriptedTaskService {
    /// Creates a service with no known tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server-side state of `id`, creating it if needed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_status(&self, id: TaskId, status: TaskStatus, result: Option<Value>) {
        self.server.lock().unwrap().insert(
            id,
            TaskStatusEntry {
                id,
                status,
                result,
                progress: None,
            },
        );
    }

    /// Removes `id` from the server, as a restart would.
    pub fn forget(&self, id: TaskId) {
        self.server.lock().unwrap().remove(&id);
    }

    /// Makes the next `count` status queries fail with a transport error.
    pub fn fail_next_queries(&self, count: usize) {
        *self.failures_remaining.lock().unwrap() = count;
    }

    /// Every id batch passed to `query_statuses`, in call order.
    pub fn query_log(&self) -> Vec<Vec<TaskId>> {
        self.queries.lock().unwrap().clone()
    }

    /// Number of `query_statuses` calls received.
    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Every submission received, in call order.
    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskService for ScriptedTaskService {
    async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, DomainError> {
        let task_id = TaskId::new();
        self.set_status(task_id, TaskStatus::Pending, None);
        self.submissions.lock().unwrap().push(request);
        Ok(SubmitResponse {
            task_id,
            status: TaskStatus::Pending,
        })
    }

    async fn query_statuses(&self, ids: &[TaskId]) -> Result<Vec<TaskStatusEntry>, DomainError> {
        self.queries.lock().unwrap().push(ids.to_vec());

        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(DomainError::Infrastructure("connection reset".into()));
            }
        }

        let server = self.server.lock().unwrap();
        Ok(ids.iter().filter_map(|id| server.get(id).cloned()).collect())
    }
}
