//! Test fixtures for pipeline and API tests

use serde_json::{json, Value};

/// A 1x1 pixel JPEG.
pub const TINY_JPEG_B64: &str = "/9j/4AAQSkZJRgABAQEASABIAAD/2wBDAP//////////////////////////////////////////////////////////////////////////////////////wgALCAABAAEBAREA/8QAFBABAAAAAAAAAAAAAAAAAAAAAP/aAAgBAQABPxA=";

pub const API_KEY: &str = "123456789";

pub const T1: &str = "2017-01-01T00:00:00.000";
pub const T2: &str = "2017-01-01T00:00:05.000";

/// One wire-format image at `timestamp`.
pub fn image(timestamp: &str) -> Value {
    json!({
        "type": "image/jpeg",
        "size": [10, 10],
        "timestamp": timestamp,
        "image_b64": TINY_JPEG_B64,
    })
}

/// A full submission body.
pub fn submission(task_id: &str, user_id: &str, timestamps: &[&str], callback_url: &str) -> Value {
    json!({
        "task_id": task_id,
        "user_id": user_id,
        "camera": "porch",
        "images": timestamps.iter().map(|t| image(t)).collect::<Vec<_>>(),
        "callback_url": callback_url,
    })
}
