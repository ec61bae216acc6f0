//! Error types for pushfeed client construction and configuration

use thiserror::Error;

/// Result type alias for pushfeed client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while building clients or loading configuration
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid bearer token or other header value
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_missing() -> Result<Vec<u8>> {
        Ok(std::fs::read("/nonexistent/pushfeed/missing")?)
    }

    #[test]
    fn test_io_errors_convert() {
        let err = read_missing().unwrap_err();
        assert!(matches!(err, ClientError::IoError(_)));
        assert!(err.to_string().starts_with("IO error: "));
    }
}
