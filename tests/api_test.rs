//! HTTP API tests against the router with an in-memory store.

mod fixtures;
mod helpers;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;

use fixtures::*;
use helpers::*;
use label_hook::app_state::AppState;
use label_hook::models::task::TaskStatus;
use label_hook::routes::api_router;
use label_hook::store::memory::MemoryTaskStore;
use label_hook::store::TaskStore;

fn test_router() -> (Router, Arc<MemoryTaskStore>) {
    let store = Arc::new(MemoryTaskStore::new());
    let state = AppState::new(store.clone(), API_KEY);
    (api_router(state, 10 * 1024 * 1024), store)
}

fn tasks_uri(secret: &str) -> String {
    format!("/tasks/{secret}")
}

#[tokio::test]
async fn test_index_and_health() {
    let (router, _) = test_router();

    let (status, body) = send(&router, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "it works!");

    let (status, body) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["checks"]["store"]["status"], "ok");
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let (router, store) = test_router();
    let payload = submission("t1", "alice", &[T1], "http://example.com/cb");

    let (status, body) = send(&router, Method::POST, &tasks_uri("nope"), Some(&payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid API Key");
    assert!(store.get("t1").await.unwrap().is_none());

    let (status, body) = send(&router, Method::GET, &tasks_uri("nope"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid API Key");
}

#[tokio::test]
async fn test_submit_then_list_pending() {
    let (router, store) = test_router();
    let payload = submission("t1", "alice", &[T1, T2], "http://example.com/cb");

    let (status, body) = send(&router, Method::POST, &tasks_uri(API_KEY), Some(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let task = store.get("t1").await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.request.images.len(), 2);

    let (status, body) = send(&router, Method::GET, &tasks_uri(API_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<String> = serde_json::from_str(&body).unwrap();
    assert_eq!(listed, vec!["alice/porch".to_string()]);
    assert!(!body.contains("example.com"));
    assert!(!body.contains(TINY_JPEG_B64));
}

#[tokio::test]
async fn test_duplicate_submission_is_a_no_op() {
    let (router, store) = test_router();
    let first = submission("same", "alice", &[T1], "http://example.com/cb");
    let second = submission("same", "mallory", &[T2], "http://evil.example.com/cb");

    let (status, _) = send(&router, Method::POST, &tasks_uri(API_KEY), Some(&first)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&router, Method::POST, &tasks_uri(API_KEY), Some(&second)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let pending = store.find_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request.user_id, "alice");
    assert_eq!(pending[0].request.callback_url, "http://example.com/cb");
}

#[tokio::test]
async fn test_submissions_without_id_are_distinct() {
    let (router, store) = test_router();
    let payload = json!({"images": [image(T1)], "callback_url": "http://example.com/cb"});

    send(&router, Method::POST, &tasks_uri(API_KEY), Some(&payload)).await;
    send(&router, Method::POST, &tasks_uri(API_KEY), Some(&payload)).await;

    let pending = store.find_pending().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].request.display_key(), "/");
}

#[tokio::test]
async fn test_invalid_payloads_are_rejected() {
    let (router, store) = test_router();

    let not_a_task = json!({"hello": "world"});
    let (status, body) = send(&router, Method::POST, &tasks_uri(API_KEY), Some(&not_a_task)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid payload");

    let duplicate_timestamps = submission("t1", "alice", &[T1, T1], "http://example.com/cb");
    let (status, _) = send(
        &router,
        Method::POST,
        &tasks_uri(API_KEY),
        Some(&duplicate_timestamps),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_callback = submission("t2", "alice", &[T1], "not a url");
    let (status, _) = send(&router, Method::POST, &tasks_uri(API_KEY), Some(&bad_callback)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(store.find_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_body_is_accepted_without_queuing() {
    let (router, store) = test_router();

    let (status, body) = send(&router, Method::POST, &tasks_uri(API_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    assert!(store.find_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claimed_tasks_leave_the_pending_list() {
    let (router, store) = test_router();
    for (id, user) in [("a", "alice"), ("b", "bob")] {
        let payload = submission(id, user, &[T1], "http://example.com/cb");
        send(&router, Method::POST, &tasks_uri(API_KEY), Some(&payload)).await;
    }

    store.claim_next_pending().await.unwrap();

    let (_, body) = send(&router, Method::GET, &tasks_uri(API_KEY), None).await;
    let listed: Vec<String> = serde_json::from_str(&body).unwrap();
    assert_eq!(listed, vec!["bob/porch".to_string()]);
}
