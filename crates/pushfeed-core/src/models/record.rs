//! Records carried by chunked streaming responses

use serde::{Deserialize, Serialize};

/// Prefix marking a line that carries a record payload
pub const DATA_PREFIX: &str = "data:";

/// Payload literal that terminates a streaming response
pub const DONE_SENTINEL: &str = "[DONE]";

/// One structured record of a streaming response
///
/// Incremental text is read from the first of: top-level `content`,
/// `choices[0].delta.content`, `delta.content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Flat incremental content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Nested delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<RecordDelta>,

    /// Choice list (chat-completion style bodies)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<RecordChoice>,

    /// Error reported by the producer in-band
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

/// Incremental delta of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One choice of a chat-completion style record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<RecordDelta>,
}

impl StreamRecord {
    /// Record carrying flat content
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// The incremental content of this record, if any
    pub fn content(&self) -> Option<&str> {
        self.content
            .as_deref()
            .or_else(|| {
                self.choices
                    .first()
                    .and_then(|c| c.delta.as_ref())
                    .and_then(|d| d.content.as_deref())
            })
            .or_else(|| self.delta.as_ref().and_then(|d| d.content.as_deref()))
    }

    /// Render this record as a `data: ...` line, newline included
    pub fn to_line(&self) -> String {
        format!(
            "{} {}\n",
            DATA_PREFIX,
            serde_json::to_string(self).unwrap_or_default()
        )
    }
}

/// The `data: [DONE]` terminator line, newline included
pub fn done_line() -> String {
    format!("{} {}\n", DATA_PREFIX, DONE_SENTINEL)
}
