//! Test helper utilities: an in-process callback receiver, stub label
//! computers and request plumbing for the router.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tower::ServiceExt;

use label_hook::models::label::{DecodedImage, Label, LabelResult};
use label_hook::services::delivery::{CallbackClient, RetryPolicy};
use label_hook::services::labeler::{ComputationError, LabelComputer};
use label_hook::services::worker::WorkerSettings;

#[derive(Clone)]
struct ReceiverState {
    status: StatusCode,
    received: Arc<Mutex<Vec<Value>>>,
}

/// HTTP server recording every JSON body POSTed to `/cb`.
pub struct CallbackReceiver {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl CallbackReceiver {
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn record(State(state): State<ReceiverState>, Json(body): Json<Value>) -> StatusCode {
    state.received.lock().unwrap().push(body);
    state.status
}

/// Start a receiver answering every callback with `status`.
pub async fn spawn_callback_receiver(status: StatusCode) -> CallbackReceiver {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/cb", post(record)).with_state(ReceiverState {
        status,
        received: received.clone(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    CallbackReceiver {
        url: format!("http://{addr}/cb"),
        received,
    }
}

/// Labels every image with a single `cat` label; fails on timestamps
/// starting with "bad".
pub struct CatLabeler;

#[async_trait]
impl LabelComputer for CatLabeler {
    async fn compute(&self, images: &[DecodedImage]) -> Result<LabelResult, ComputationError> {
        let mut result = LabelResult::new();
        for image in images {
            if image.timestamp.starts_with("bad") {
                return Err(ComputationError::Failed(format!(
                    "model rejected image {}",
                    image.timestamp
                )));
            }
            result.entry(image.timestamp.clone()).or_default().insert(
                "cat".to_string(),
                Label {
                    probability: 0.9,
                    polygon: vec![],
                },
            );
        }
        Ok(result)
    }
}

pub struct PanickingLabeler;

#[async_trait]
impl LabelComputer for PanickingLabeler {
    async fn compute(&self, _images: &[DecodedImage]) -> Result<LabelResult, ComputationError> {
        panic!("model weights missing");
    }
}

pub struct SlowLabeler(pub Duration);

#[async_trait]
impl LabelComputer for SlowLabeler {
    async fn compute(&self, _images: &[DecodedImage]) -> Result<LabelResult, ComputationError> {
        tokio::time::sleep(self.0).await;
        Ok(LabelResult::new())
    }
}

/// Worker settings suited to tests: fast retries, short timeouts.
pub fn test_settings() -> WorkerSettings {
    WorkerSettings {
        poll_interval: Duration::from_secs(10),
        compute_timeout: Duration::from_secs(5),
        delivery: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        },
        notify_on_error: true,
        claim_timeout: Duration::from_secs(3600),
    }
}

pub fn callback_client() -> CallbackClient {
    CallbackClient::new(Duration::from_secs(5)).unwrap()
}

/// Send one request through the router and return status plus body text.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<&Value>,
) -> (StatusCode, String) {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(value).unwrap()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
