//! Test error types.

use thiserror::Error;

/// Errors raised while turning a scripted reply into a response.
#[derive(Debug, Error)]
pub enum TestError {
    /// Header name or value is invalid
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Status code is out of range
    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No reply was scripted for the request
    #[error("No scripted reply for {method} {path}")]
    Unscripted {
        /// Request method
        method: String,
        /// Request path
        path: String,
    },
}

/// Result alias for test helpers.
pub type TestResult<T> = Result<T, TestError>;
