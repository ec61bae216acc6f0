//! Errors raised while decoding wire messages

use thiserror::Error;

/// Result type for frame decoding
pub type FrameResult<T> = Result<T, FrameError>;

/// Reasons an inbound frame fails structural validation
#[derive(Debug, Error)]
pub enum FrameError {
    /// Payload was not valid JSON or did not have the frame shape
    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The `type` tag was present but empty
    #[error("Frame has an empty type tag")]
    EmptyType,

    /// The target id was present but empty
    #[error("Frame has an empty target id")]
    EmptyTarget,
}
