//! Inbound channel frames

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::TargetId;
use crate::error::{FrameError, FrameResult};

/// A structurally valid frame pushed by the server over the duplex channel
///
/// Only `type` and `target_id` are interpreted; every other field is carried
/// through verbatim in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Discriminating type tag (e.g. "metrics", "status")
    #[serde(rename = "type")]
    pub kind: String,

    /// Target this frame describes
    #[serde(alias = "server_id")]
    pub target_id: TargetId,

    /// Application fields, opaque to the ingestion layer
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Frame {
    /// Create a frame with no application fields
    pub fn new(kind: impl Into<String>, target_id: impl Into<TargetId>) -> Self {
        Self {
            kind: kind.into(),
            target_id: target_id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style helper for attaching an application field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Decode and validate a frame from raw message text
    pub fn decode(text: &str) -> FrameResult<Self> {
        let frame: Frame = serde_json::from_str(text)?;
        if frame.kind.is_empty() {
            return Err(FrameError::EmptyType);
        }
        if frame.target_id.is_empty() {
            return Err(FrameError::EmptyTarget);
        }
        Ok(frame)
    }

    /// Encode the frame as JSON text
    pub fn encode(&self) -> String {
        // A Map<String, Value> with string keys always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Get an application field as a specific type
    pub fn get<T: serde::de::DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.fields
            .get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get an application field as f64
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(|v| v.as_f64())
    }

    /// Get an application field as string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    /// Check if an application field is present
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}
