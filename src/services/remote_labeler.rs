use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use crate::models::label::{DecodedImage, LabelResult};
use crate::services::labeler::{ComputationError, LabelComputer};

/// Label computer backed by an external model service.
///
/// Sends the batch in the same shape callers submit it and expects
/// `{"labels": {...}}` back.
pub struct RemoteLabeler {
    http: Client,
    url: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct RemoteImage<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    size: (u32, u32),
    timestamp: &'a str,
    image_b64: String,
}

#[derive(Serialize)]
struct RemoteRequest<'a> {
    images: Vec<RemoteImage<'a>>,
}

#[derive(Deserialize)]
struct RemoteResponse {
    labels: LabelResult,
}

impl RemoteLabeler {
    pub fn new(url: String, api_token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            url,
            api_token,
        }
    }
}

#[async_trait]
impl LabelComputer for RemoteLabeler {
    async fn compute(&self, images: &[DecodedImage]) -> Result<LabelResult, ComputationError> {
        let request_body = RemoteRequest {
            images: images
                .iter()
                .map(|image| RemoteImage {
                    content_type: &image.content_type,
                    size: image.size,
                    timestamp: &image.timestamp,
                    image_b64: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                })
                .collect(),
        };

        let mut request = self.http.post(&self.url).json(&request_body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        let body: RemoteResponse = response.json().await?;
        Ok(body.labels)
    }
}
