//! Observability for Custodian.
//!
//! - **Logging**: structured JSON or pretty output via `tracing-subscriber`
//! - **Metrics**: pipeline counters and queue gauges via the `metrics` crate,
//!   optionally exported in Prometheus format
//!
//! # Example
//!
//! ```rust,ignore
//! use custodian_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};
//!
//! let config = TelemetryConfig {
//!     logging: LogConfig::development(),
//!     metrics: MetricsConfig { enabled: true, addr: Some("127.0.0.1:9464".into()) },
//! };
//! init_telemetry(&config)?;
//! ```
//!
//! # Metrics Endpoint
//!
//! ```text
//! # TYPE custodian_requests_total counter
//! custodian_requests_total{outcome="success"} 1234
//! custodian_requests_total{outcome="refresh"} 3
//! # TYPE custodian_stage_queue_depth gauge
//! custodian_stage_queue_depth{stage="csrf"} 1
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_telemetry_initializes() {
        let config = TelemetryConfig {
            logging: LogConfig {
                enabled: false,
                ..LogConfig::default()
            },
            metrics: MetricsConfig::default(),
        };
        assert!(init_telemetry(&config).is_ok());
    }
}
