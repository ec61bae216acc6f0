//! Types for chunked streaming responses

use thiserror::Error;

/// Lifecycle of one streaming read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Chunks are still being consumed
    Active,
    /// Sentinel seen or body ended
    Completed,
    /// Transport failed mid-stream
    Errored,
    /// Caller aborted the read
    Cancelled,
}

impl StreamStatus {
    /// Whether the session reached a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamStatus::Active)
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamStatus::Active => "active",
            StreamStatus::Completed => "completed",
            StreamStatus::Errored => "errored",
            StreamStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One increment of accumulated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUpdate {
    /// Text appended by this record
    pub delta: String,
    /// Length in bytes of the accumulated text after appending `delta`
    pub accumulated_len: usize,
}

/// Final result of a streaming read
#[derive(Debug)]
pub struct StreamOutcome {
    pub status: StreamStatus,
    /// Everything accumulated, including partial text on error or abort
    pub text: String,
    /// Transport error that ended the read, if any
    pub error: Option<StreamError>,
    /// Record lines skipped as malformed
    pub skipped: usize,
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == StreamStatus::Completed
    }
}

/// Errors that can occur during streaming
#[derive(Debug, Error)]
pub enum StreamError {
    /// HTTP/connection error
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// Body stream failed after the response started
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server returned an error
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Read was aborted before the response started
    #[error("Stream cancelled")]
    Cancelled,
}

/// Result type for streaming operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;
