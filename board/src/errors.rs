//! Error types for deployboard

use thiserror::Error;

use crate::models::record::Source;

/// Main error type for the deployment board
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fetch from {origin} failed: {message}")]
    FetchError { origin: Source, message: String },

    #[error("Fetch from {0} timed out")]
    Timeout(Source),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for BoardError {
    fn from(err: anyhow::Error) -> Self {
        BoardError::Internal(err.to_string())
    }
}
