//! Routes for background task submission and status queries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use tracing::{info, instrument};
use uuid::Uuid;

use storyloom_core::service::{
    StatusQueryRequest, StatusQueryResponse, SubmitRequest, SubmitResponse,
};
use storyloom_core::task::{TaskId, TaskStatus};
use storyloom_tasks::application::{command_handlers, query_handlers};
use storyloom_tasks::domain::commands;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /
#[instrument(skip(state, request), fields(kind = %request.kind))]
async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let command = commands::SubmitTask {
        correlation_id: Uuid::new_v4(),
        kind: request.kind,
        label: request.label,
        payload: request.payload,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_task command");

    let task_id = command_handlers::handle_submit_task(
        command,
        &state.catalog,
        &*state.registry,
        &state.executor,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id,
            status: TaskStatus::Pending,
        }),
    ))
}

/// POST /status
#[instrument(skip(state, request), fields(requested = request.ids.len()))]
async fn query_statuses(
    State(state): State<AppState>,
    Json(request): Json<StatusQueryRequest>,
) -> Result<Json<StatusQueryResponse>, ApiError> {
    let tasks = query_handlers::query_task_statuses(&request.ids, &*state.registry).await?;
    Ok(Json(StatusQueryResponse { tasks }))
}

/// GET /{id}
#[instrument(skip(state), fields(task_id = %task_id))]
async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> Result<Json<query_handlers::TaskDetailView>, ApiError> {
    let view = query_handlers::get_task_by_id(task_id, &*state.registry).await?;
    Ok(Json(view))
}

/// Returns the router for the task interfaces.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_task))
        .route("/status", post(query_statuses))
        .route("/{id}", get(get_task))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};
    use storyloom_core::registry::TaskRegistry;
    use storyloom_core::task::{TaskKind, TaskUpdate};
    use storyloom_task_store::memory_registry::InMemoryTaskRegistry;
    use storyloom_tasks::domain::catalog::WorkCatalog;
    use storyloom_test_support::{FailingTaskRegistry, FixedClock, GatedWork};
    use tower::ServiceExt;

    fn memory_registry() -> Arc<InMemoryTaskRegistry> {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Arc::new(InMemoryTaskRegistry::new(Arc::new(FixedClock(now))))
    }

    fn app_state_with(registry: Arc<dyn TaskRegistry>) -> AppState {
        let catalog = WorkCatalog::new().with(TaskKind::Analyze, Arc::new(GatedWork::new()));
        AppState::new(registry, catalog)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_202_with_pending_task() {
        // Arrange
        let registry = memory_registry();
        let app = router().with_state(app_state_with(registry.clone()));
        let body = json!({ "kind": "analyze", "label": "Chapter one", "payload": { "text": "Once." } });

        // Act
        let (status, json) = send(app, post("/", &body)).await;

        // Assert
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "pending");
        let task_id: TaskId = json["task_id"].as_str().unwrap().parse().unwrap();
        assert!(registry.get(&[task_id]).await.unwrap().contains_key(&task_id));
    }

    #[tokio::test]
    async fn test_submit_unregistered_kind_returns_503() {
        let registry = memory_registry();
        let app = router().with_state(app_state_with(registry.clone()));
        let body = json!({ "kind": "generate-description", "label": "World", "payload": {} });

        let (status, json) = send(app, post("/", &body)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "work_unavailable");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_submit_blank_label_returns_400() {
        let app = router().with_state(app_state_with(memory_registry()));
        let body = json!({ "kind": "analyze", "label": "  ", "payload": { "text": "Once." } });

        let (status, json) = send(app, post("/", &body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_submit_returns_500_when_registry_fails() {
        let app = router().with_state(app_state_with(Arc::new(FailingTaskRegistry)));
        let body = json!({ "kind": "analyze", "label": "Chapter", "payload": { "text": "Once." } });

        let (status, _) = send(app, post("/", &body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_status_query_omits_unknown_ids() {
        // Arrange
        let registry = memory_registry();
        let done = registry.create(TaskKind::Analyze, "done").await.unwrap();
        registry
            .set_result(done, TaskUpdate::Completed(json!({ "chars": 3 })))
            .await
            .unwrap();
        let unknown = TaskId::new();
        let app = router().with_state(app_state_with(registry));

        // Act
        let (status, json) = send(app, post("/status", &json!({ "ids": [done, unknown] }))).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        let tasks = json["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["id"], done.to_string());
        assert_eq!(tasks[0]["status"], "completed");
        assert_eq!(tasks[0]["result"], json!({ "chars": 3 }));
    }

    #[tokio::test]
    async fn test_get_task_returns_404_for_unknown_id() {
        let app = router().with_state(app_state_with(memory_registry()));
        let request = Request::builder()
            .uri(format!("/{}", TaskId::new()))
            .body(Body::empty())
            .unwrap();

        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "task_not_found");
    }

    #[tokio::test]
    async fn test_get_task_returns_label_and_status() {
        let registry = memory_registry();
        let id = registry.create(TaskKind::Analyze, "Chapter two").await.unwrap();
        let app = router().with_state(app_state_with(registry));
        let request = Request::builder()
            .uri(format!("/{id}"))
            .body(Body::empty())
            .unwrap();

        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["label"], "Chapter two");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["kind"], "analyze");
    }
}
