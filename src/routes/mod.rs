use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod health;
pub mod metrics;
pub mod tasks;

/// Task API routes. Image batches are large, so axum's default body limit
/// is replaced by an explicit one.
pub fn api_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health_check))
        .route(
            "/tasks/{secret}",
            get(tasks::list_pending).post(tasks::submit_task),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}
