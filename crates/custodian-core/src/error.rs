//! Error types for Custodian.
//!
//! This module provides [`ClientError`], the cause carried by every
//! [`FailureEnvelope`](crate::FailureEnvelope) that leaves the pipeline.
//!
//! # Failure classes
//!
//! | `ErrorCategory` | Produced by | Handling |
//! |---|---|---|
//! | `Transport` | transport, no response | never retried |
//! | `Auth` | HTTP 401 with a response | refresh + retry |
//! | `Refresh` | failed token acquisition | terminal |
//! | `Http` | any other non-2xx status | passed through |
//! | `Rejected` | an interceptor's own verdict | terminal |
//! | `Hook` | hook panic or timeout | terminal |
//! | `Request` | a request that could not be built | never dispatched |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`ClientError`].
pub type ClientResult<T> = Result<T, ClientError>;

/// Categories of failures for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No HTTP response was produced (connection refused, TLS, timeout).
    Transport,
    /// The server rejected the credential (HTTP 401).
    Auth,
    /// The nested token acquisition call failed.
    Refresh,
    /// Any other non-success HTTP status.
    Http,
    /// An interceptor rejected the request on its own terms.
    Rejected,
    /// An interceptor hook panicked or timed out.
    Hook,
    /// The request could not be built.
    Request,
}

impl ErrorCategory {
    /// Returns the label used for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Auth => "auth",
            Self::Refresh => "refresh",
            Self::Http => "http",
            Self::Rejected => "rejected",
            Self::Hook => "hook",
            Self::Request => "request",
        }
    }
}

/// The cause of a failed request.
///
/// `ClientError` is cheap to clone so that envelopes can be copied into
/// test scripts and logs without losing the original cause.
///
/// # Example
///
/// ```
/// use custodian_core::{ClientError, ErrorCategory};
/// use http::StatusCode;
///
/// let error = ClientError::from_status(StatusCode::UNAUTHORIZED);
/// assert_eq!(error.category(), ErrorCategory::Auth);
/// assert!(error.is_retryable_auth());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The transport failed before an HTTP response was available.
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error message.
        message: String,
    },

    /// The server answered 401: the credential was rejected.
    #[error("Authorization failed: server returned {status}")]
    Auth {
        /// The status returned by the server.
        status: StatusCode,
    },

    /// Refreshing the credential failed.
    #[error("Token refresh failed: {message}")]
    Refresh {
        /// Human-readable error message.
        message: String,
        /// Status of the refresh response, if one was received.
        status: Option<StatusCode>,
    },

    /// The server answered with a non-success status other than 401.
    #[error("HTTP error: server returned {status}")]
    Http {
        /// The status returned by the server.
        status: StatusCode,
    },

    /// An interceptor rejected the request.
    #[error("Rejected by {stage}: {message}")]
    Rejected {
        /// Name of the stage that rejected.
        stage: String,
        /// Human-readable error message.
        message: String,
    },

    /// An interceptor hook panicked.
    #[error("Interceptor {stage} panicked in {hook}: {message}")]
    HookPanicked {
        /// Name of the stage whose hook panicked.
        stage: String,
        /// Which hook panicked.
        hook: &'static str,
        /// The panic payload, when it was a string.
        message: String,
    },

    /// An interceptor hook did not complete in time.
    #[error("Interceptor {stage} timed out in {hook} after {elapsed:?}")]
    HookTimeout {
        /// Name of the stage whose hook timed out.
        stage: String,
        /// Which hook timed out.
        hook: &'static str,
        /// The configured timeout.
        elapsed: Duration,
    },

    /// The request could not be built (invalid header, body encoding).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Human-readable error message.
        message: String,
    },
}

impl ClientError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a refresh error.
    #[must_use]
    pub fn refresh(message: impl Into<String>, status: Option<StatusCode>) -> Self {
        Self::Refresh {
            message: message.into(),
            status,
        }
    }

    /// Creates a rejection on behalf of a stage.
    #[must_use]
    pub fn rejected(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Classifies a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            Self::Auth { status }
        } else {
            Self::Http { status }
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Auth { .. } => ErrorCategory::Auth,
            Self::Refresh { .. } => ErrorCategory::Refresh,
            Self::Http { .. } => ErrorCategory::Http,
            Self::Rejected { .. } => ErrorCategory::Rejected,
            Self::HookPanicked { .. } | Self::HookTimeout { .. } => ErrorCategory::Hook,
            Self::InvalidRequest { .. } => ErrorCategory::Request,
        }
    }

    /// Returns `true` for the failure class eligible for refresh and retry.
    #[must_use]
    pub const fn is_retryable_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns the HTTP status associated with this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Auth { status } | Self::Http { status } => Some(*status),
            Self::Refresh { status, .. } => *status,
            _ => None,
        }
    }
}
