use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single label prediction for one image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub probability: f64,
    /// Normalized (x, y) points, origin bottom-left, (1, 1) top-right.
    #[serde(default)]
    pub polygon: Vec<(f64, f64)>,
}

/// Labels for one image, keyed by label name.
pub type ImageLabels = BTreeMap<String, Label>;

/// Labels for a whole batch, keyed by image timestamp.
pub type LabelResult = BTreeMap<String, ImageLabels>;

/// An image after base64 decoding, as handed to a label computer.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub content_type: String,
    pub size: (u32, u32),
    pub timestamp: String,
    pub bytes: Vec<u8>,
}
