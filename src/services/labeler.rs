//! Label computers.
//!
//! A [`LabelComputer`] turns a decoded image batch into a [`LabelResult`].
//! The worker treats it as an opaque capability: any error fails the whole
//! batch, no partial results are kept.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;

use crate::models::label::{DecodedImage, ImageLabels, Label, LabelResult};
use crate::models::task::ImagePayload;

#[derive(Debug, thiserror::Error)]
pub enum ComputationError {
    #[error("Image {timestamp} is not valid base64: {source}")]
    Decode {
        timestamp: String,
        source: base64::DecodeError,
    },

    #[error("Image {timestamp} is not a recognised image format")]
    UnsupportedImage { timestamp: String },

    #[error("Label computer returned invalid output: {0}")]
    InvalidOutput(String),

    #[error("Label computation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Label computer panicked: {0}")]
    Panicked(String),

    #[error("Remote labeler request failed: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("Labeling failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait LabelComputer: Send + Sync {
    async fn compute(&self, images: &[DecodedImage]) -> Result<LabelResult, ComputationError>;
}

/// Decode the base64 payload of every image in a request.
pub fn decode_images(images: &[ImagePayload]) -> Result<Vec<DecodedImage>, ComputationError> {
    images
        .iter()
        .map(|image| {
            // Line-wrapped base64 (76-column MIME style) is common in the wild.
            let compact: Vec<u8> = image
                .image_b64
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&compact)
                .map_err(|source| ComputationError::Decode {
                    timestamp: image.timestamp.clone(),
                    source,
                })?;
            Ok(DecodedImage {
                content_type: image.content_type.clone(),
                size: image.size,
                timestamp: image.timestamp.clone(),
                bytes,
            })
        })
        .collect()
}

/// Reject results that reference unknown images or fall outside [0, 1].
pub fn validate_labels(labels: &LabelResult, images: &[DecodedImage]) -> Result<(), ComputationError> {
    let known: HashSet<&str> = images.iter().map(|i| i.timestamp.as_str()).collect();
    let unit = 0.0..=1.0;

    for (timestamp, image_labels) in labels {
        if !known.contains(timestamp.as_str()) {
            return Err(ComputationError::InvalidOutput(format!(
                "labels for unknown image {timestamp}"
            )));
        }
        for (name, label) in image_labels {
            if !unit.contains(&label.probability) {
                return Err(ComputationError::InvalidOutput(format!(
                    "{timestamp}/{name}: probability {} outside [0, 1]",
                    label.probability
                )));
            }
            if let Some((x, y)) = label
                .polygon
                .iter()
                .find(|(x, y)| !unit.contains(x) || !unit.contains(y))
            {
                return Err(ComputationError::InvalidOutput(format!(
                    "{timestamp}/{name}: polygon point ({x}, {y}) outside the unit square"
                )));
            }
        }
    }
    Ok(())
}

/// Demonstration labeler: checks each image is a real image and tags it
/// with a fixed set of labels.
#[derive(Debug, Clone)]
pub struct StaticLabeler {
    labels: ImageLabels,
}

impl Default for StaticLabeler {
    fn default() -> Self {
        let mut labels = ImageLabels::new();
        for (name, probability) in [("cat", 0.93), ("dog", 0.88)] {
            labels.insert(
                name.to_string(),
                Label {
                    probability,
                    polygon: vec![],
                },
            );
        }
        Self { labels }
    }
}

impl StaticLabeler {
    pub fn new(labels: ImageLabels) -> Self {
        Self { labels }
    }
}

#[async_trait]
impl LabelComputer for StaticLabeler {
    async fn compute(&self, images: &[DecodedImage]) -> Result<LabelResult, ComputationError> {
        let mut result = LabelResult::new();
        for image in images {
            image::guess_format(&image.bytes).map_err(|_| ComputationError::UnsupportedImage {
                timestamp: image.timestamp.clone(),
            })?;
            result.insert(image.timestamp.clone(), self.labels.clone());
        }
        Ok(result)
    }
}
