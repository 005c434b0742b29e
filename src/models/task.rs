use std::collections::HashSet;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::label::LabelResult;

/// Lifecycle of a task in the queue.
///
/// `InFlight` is the internal claim marker; callers only ever see
/// `pending`, `completed` or `error`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InFlight,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

/// One image as it travels over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImagePayload {
    #[serde(rename = "type")]
    pub content_type: String,
    /// (width, height) in pixels.
    pub size: (u32, u32),
    /// ISO-8601 capture time, the join key for results.
    pub timestamp: String,
    pub image_b64: String,
}

/// The original submission, immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct TaskRequest {
    #[serde(default)]
    #[garde(length(max = 200))]
    pub user_id: String,

    #[serde(default)]
    #[garde(length(max = 200))]
    pub camera: String,

    #[serde(default)]
    #[garde(custom(unique_timestamps))]
    pub images: Vec<ImagePayload>,

    #[garde(url)]
    pub callback_url: String,
}

impl TaskRequest {
    /// Operator-facing identifier, never exposes image bytes or callback URLs.
    pub fn display_key(&self) -> String {
        format!("{}/{}", self.user_id, self.camera)
    }
}

fn unique_timestamps(images: &Vec<ImagePayload>, _ctx: &()) -> garde::Result {
    let mut seen = HashSet::with_capacity(images.len());
    for image in images {
        if !seen.insert(image.timestamp.as_str()) {
            return Err(garde::Error::new(format!(
                "duplicate image timestamp {}",
                image.timestamp
            )));
        }
    }
    Ok(())
}

/// Body of `POST /tasks/{secret}`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTask {
    /// Caller-supplied identifier; resubmitting it is a no-op.
    #[serde(default)]
    #[garde(length(min = 1, max = 128))]
    pub task_id: Option<String>,

    #[serde(flatten)]
    #[garde(dive)]
    pub request: TaskRequest,
}

/// Outcome of pushing a result to the callback URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeliveryRecord {
    pub attempts: u32,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_error: Option<String>,
}

/// What a completed task keeps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub labels: LabelResult,
    pub delivery: DeliveryRecord,
}

/// A queued labeling job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub request: TaskRequest,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub failure_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// New pending task; generates an id when the caller did not supply one.
    pub fn new(id: Option<String>, request: TaskRequest) -> Self {
        let now = Utc::now();
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request,
            status: TaskStatus::Pending,
            result: None,
            failure_detail: None,
            created_at: now,
            updated_at: now,
            claimed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn image(ts: &str) -> ImagePayload {
        ImagePayload {
            content_type: "image/jpeg".to_string(),
            size: (10, 10),
            timestamp: ts.to_string(),
            image_b64: String::new(),
        }
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        assert_eq!(TaskStatus::InFlight.to_string(), "in_flight");
        assert_eq!(TaskStatus::from_str("error").unwrap(), TaskStatus::Error);
        assert!(TaskStatus::Completed.is_terminal());
        assert!(!TaskStatus::InFlight.is_terminal());
    }

    #[test]
    fn test_submission_parses_wire_format() {
        let body = r#"{
            "images": [{"type": "image/jpeg", "size": [640, 480],
                        "timestamp": "2017-05-05T01:31:13.738647", "image_b64": "AAAA"}],
            "user_id": "alice",
            "camera": "porch",
            "callback_url": "http://example.com/cb"
        }"#;
        let submit: SubmitTask = serde_json::from_str(body).unwrap();
        assert!(submit.task_id.is_none());
        assert_eq!(submit.request.images[0].size, (640, 480));
        assert_eq!(submit.request.display_key(), "alice/porch");
        assert!(submit.validate().is_ok());
    }

    #[test]
    fn test_duplicate_timestamps_rejected() {
        let request = TaskRequest {
            user_id: String::new(),
            camera: String::new(),
            images: vec![image("2017-01-01T00:00:00"), image("2017-01-01T00:00:00")],
            callback_url: "http://example.com/cb".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_callback_url_must_be_url() {
        let request = TaskRequest {
            user_id: String::new(),
            camera: String::new(),
            images: vec![image("2017-01-01T00:00:00")],
            callback_url: "not a url".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let request: TaskRequest =
            serde_json::from_str(r#"{"callback_url": "http://example.com/cb"}"#).unwrap();
        let a = Task::new(None, request.clone());
        let b = Task::new(None, request);
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, TaskStatus::Pending);
    }
}
