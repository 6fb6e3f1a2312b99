//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use http_body_util::BodyExt;
use storyloom_core::clock::Clock;
use storyloom_core::task::TaskKind;
use storyloom_task_store::memory_registry::InMemoryTaskRegistry;
use storyloom_tasks::domain::catalog::WorkCatalog;
use storyloom_test_support::FixedClock;
use tower::ServiceExt;

use storyloom_api::routes;
use storyloom_api::state::AppState;
use storyloom_api::work::{BatchAnalysisWork, TextAnalysisWork};

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// The catalog `main.rs` registers.
pub fn default_catalog() -> WorkCatalog {
    WorkCatalog::new()
        .with(TaskKind::Analyze, Arc::new(TextAnalysisWork))
        .with(TaskKind::BatchAnalyze, Arc::new(BatchAnalysisWork::new(3)))
}

/// Build the full app router over a fresh in-memory registry, which is also
/// returned for inspection.
pub fn build_test_app() -> (Router, Arc<InMemoryTaskRegistry>) {
    build_test_app_with(default_catalog())
}

/// Build the full app router with a custom work catalog.
pub fn build_test_app_with(catalog: WorkCatalog) -> (Router, Arc<InMemoryTaskRegistry>) {
    let registry = Arc::new(InMemoryTaskRegistry::new(fixed_clock()));
    let app = routes::app(AppState::new(registry.clone(), catalog), &[]);
    (app, registry)
}

/// Build the full app router accepting cross-origin requests from `origins` only.
pub fn build_test_app_with_origins(origins: &[&'static str]) -> Router {
    let origins: Vec<_> = origins.iter().copied().map(HeaderValue::from_static).collect();
    let registry = Arc::new(InMemoryTaskRegistry::new(fixed_clock()));
    routes::app(AppState::new(registry, default_catalog()), &origins)
}

/// Serve `app` on an ephemeral local port and return its address.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
