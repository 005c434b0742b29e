use serde::{Deserialize, Serialize};

use crate::models::label::LabelResult;

/// JSON body POSTed to a task's callback URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallbackPayload {
    Success { labels: LabelResult },
    Error { detail: String },
}
