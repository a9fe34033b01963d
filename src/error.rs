//! Error types for the SERP extraction library.

use thiserror::Error;

/// Result type alias for SERP operations.
pub type Result<T> = std::result::Result<T, SerpError>;

/// Errors that can occur while driving a search session.
#[derive(Error, Debug)]
pub enum SerpError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Browser process or CDP operation failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Extraction payload could not be loaded.
    #[error("Extraction payload error: {0}")]
    Payload(String),

    /// CAPTCHA solving failed.
    #[error("Challenge solving error: {0}")]
    Challenge(String),

    /// Incoming request was malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Required configuration is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}
