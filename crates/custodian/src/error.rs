//! Errors raised while assembling a client.
//!
//! Request failures are not errors of this kind: they travel through the
//! pipeline as [`FailureEnvelope`](custodian_core::FailureEnvelope)s.

use custodian_config::ConfigError;
use custodian_telemetry::TelemetryError;
use thiserror::Error;

/// Result type for client construction.
pub type CustodianResult<T> = Result<T, CustodianError>;

/// Errors raised while building a [`CsrfClient`](crate::CsrfClient).
#[derive(Debug, Error)]
pub enum CustodianError {
    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Telemetry could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
