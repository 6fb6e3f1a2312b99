//! HTTP implementation of the task service, talking to the Storyloom API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use storyloom_core::error::DomainError;
use storyloom_core::service::{
    StatusQueryRequest, StatusQueryResponse, SubmitRequest, SubmitResponse, TaskService,
};
use storyloom_core::task::{TaskId, TaskStatusEntry};

use crate::error::ClientError;

const SUBMIT_PATH: &str = "/api/v1/tasks";
const STATUS_PATH: &str = "/api/v1/tasks/status";

/// Task service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTaskService {
    /// Creates a service for the API at `base_url`, e.g. `http://localhost:3000`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Creates a service using a preconfigured client (timeouts, proxies).
    #[must_use]
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(response.json().await?)
    }
}

/// Pulls the `message` field out of an API error body, falling back to the
/// raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.to_owned())
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, DomainError> {
        let kind = request.kind;
        self.post(SUBMIT_PATH, &request)
            .await
            .map_err(|e| match e {
                ClientError::Status { status, message }
                    if status == StatusCode::BAD_REQUEST.as_u16()
                        || status == StatusCode::UNPROCESSABLE_ENTITY.as_u16() =>
                {
                    DomainError::Validation(message)
                }
                ClientError::Status { status, .. }
                    if status == StatusCode::SERVICE_UNAVAILABLE.as_u16() =>
                {
                    DomainError::WorkUnavailable(kind)
                }
                other => DomainError::Infrastructure(other.to_string()),
            })
    }

    async fn query_statuses(&self, ids: &[TaskId]) -> Result<Vec<TaskStatusEntry>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = StatusQueryRequest { ids: ids.to_vec() };
        let response: StatusQueryResponse = self
            .post(STATUS_PATH, &request)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))?;
        debug!(
            queried = ids.len(),
            known = response.tasks.len(),
            "status query answered"
        );
        Ok(response.tasks)
    }
}
