//! Route modules.

pub mod health;
pub mod tasks;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router. Cross-origin requests are accepted
/// from `cors_origins` only, or from anywhere when the list is empty.
pub fn app(state: AppState, cors_origins: &[HeaderValue]) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/tasks", tasks::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
        .allow_methods(Any)
        .allow_headers(Any)
}
