//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Failed to parse the metrics listen address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
