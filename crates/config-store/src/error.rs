//! Config store errors

use thiserror::Error;

/// Errors that can occur when looking up configuration values
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Config service returned an error
    #[error("Config store API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stack file could not be parsed
    #[error("Stack file error: {0}")]
    StackFile(#[from] serde_yaml::Error),

    /// Stack file parsed but holds a value the store cannot serve
    #[error("Invalid stack file: {0}")]
    InvalidStackFile(String),

    /// Stack file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Key is not set (or is set to an empty value)
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Whether the error means the key is absent rather than the store failing
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
