//! Wire messages
//!
//! Inbound text messages are either the bare literal `close` or a JSON object:
//!
//! ```text
//! { "image": "data:image/...", "seg_image"?: "data:image/...",
//!   "bboxes"?: [{ "obj_tag": "...", "bbox": { "top_left_x": .. } }] }
//! ```
//!
//! Outbound messages are `{ "image": "...", "seg_image"?: "..." }`.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::media::annotation::Annotation;

/// Control literal that ends a session
pub const CLOSE_COMMAND: &str = "close";

/// A parsed inbound text message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Client asked to end the session
    Close,
    /// Frame data and/or annotations
    Data(DataMessage),
}

impl ClientMessage {
    /// Parse an inbound text message
    ///
    /// Only the exact literal `close` is a control message; everything else
    /// must be a JSON object. Unknown keys are ignored.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text == CLOSE_COMMAND {
            return Ok(ClientMessage::Close);
        }

        serde_json::from_str(text)
            .map(ClientMessage::Data)
            .map_err(ProtocolError::InvalidJson)
    }
}

/// Inbound data payload; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataMessage {
    /// Primary frame as a data URL
    #[serde(default)]
    pub image: Option<String>,

    /// Mask key image as a data URL
    #[serde(default)]
    pub seg_image: Option<String>,

    /// Replacement annotation list
    #[serde(default)]
    pub bboxes: Option<Vec<Annotation>>,
}

impl DataMessage {
    /// True if the message carries nothing the session acts on
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.seg_image.is_none() && self.bboxes.is_none()
    }
}

/// Outbound frame message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerMessage {
    /// Processed (or latest raw) frame as a PNG data URL
    pub image: String,

    /// Rendered segmentation mask as a PNG data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seg_image: Option<String>,
}

impl ServerMessage {
    pub fn new(image: String) -> Self {
        Self {
            image,
            seg_image: None,
        }
    }

    pub fn with_seg_image(mut self, seg_image: String) -> Self {
        self.seg_image = Some(seg_image);
        self
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Serialize)
    }
}
