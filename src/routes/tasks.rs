use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::task::{SubmitTask, Task};

const INVALID_API_KEY: &str = "Invalid API Key";

/// POST /tasks/{secret} — queue a labeling task.
///
/// Answers "ok" for duplicates too: resubmitting is harmless for callers.
pub async fn submit_task(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    tracing::info!(payload_size = body.len(), "Task submission received");

    if !state.is_authorized(&secret) {
        return (StatusCode::BAD_REQUEST, INVALID_API_KEY);
    }
    if body.is_empty() {
        return (StatusCode::OK, "ok");
    }

    let submit: SubmitTask = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed task payload");
            return (StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };
    if let Err(report) = submit.validate() {
        tracing::warn!(error = %report, "Rejected invalid task payload");
        return (StatusCode::BAD_REQUEST, "Invalid payload");
    }

    let task = Task::new(submit.task_id, submit.request);
    let task_id = task.id.clone();

    match state.store.insert(task).await {
        Ok(true) => {
            metrics::counter!("tasks_submitted_total").increment(1);
            tracing::info!(task_id = %task_id, "Task queued");
            (StatusCode::OK, "ok")
        }
        Ok(false) => {
            metrics::counter!("tasks_duplicate_total").increment(1);
            tracing::info!(task_id = %task_id, "Duplicate submission ignored");
            (StatusCode::OK, "ok")
        }
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "Failed to queue task");
            (StatusCode::INTERNAL_SERVER_ERROR, "Store unavailable")
        }
    }
}

/// GET /tasks/{secret} — "<user_id>/<camera>" for every pending task.
pub async fn list_pending(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> Response {
    if !state.is_authorized(&secret) {
        return (StatusCode::BAD_REQUEST, INVALID_API_KEY).into_response();
    }

    match state.store.pending_keys().await {
        Ok(keys) => Json(keys).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list pending tasks");
            (StatusCode::INTERNAL_SERVER_ERROR, "Store unavailable").into_response()
        }
    }
}
