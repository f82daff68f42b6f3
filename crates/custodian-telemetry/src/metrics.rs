//! Pipeline metrics.
//!
//! Recording goes through the `metrics` facade, so the functions here are
//! no-ops until a recorder is installed (for example by [`init_metrics`]).
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `custodian_requests_total` | Counter | `outcome` | Completed `send` calls |
//! | `custodian_token_refresh_total` | Counter | `outcome` | Credential refresh attempts |
//! | `custodian_retries_total` | Counter | `outcome` | Replays after a refresh |
//! | `custodian_stage_queue_depth` | Gauge | `stage` | Active plus waiting activations |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

/// Completed requests, labelled by outcome.
pub const REQUESTS_TOTAL: &str = "custodian_requests_total";

/// Credential refresh attempts, labelled by outcome.
pub const TOKEN_REFRESH_TOTAL: &str = "custodian_token_refresh_total";

/// Request replays, labelled by outcome.
pub const RETRIES_TOTAL: &str = "custodian_retries_total";

/// Per-stage queue depth.
pub const STAGE_QUEUE_DEPTH: &str = "custodian_stage_queue_depth";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,

    /// Address to serve `/metrics` on. Without one, metrics are only
    /// available through [`render_metrics`].
    pub addr: Option<String>,
}

/// Installs the Prometheus recorder.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new();

    match &config.addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            builder
                .with_http_listener(addr)
                .install()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        }
        None => {
            let handle = builder
                .install_recorder()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let _ = METRICS_HANDLE.set(handle);
        }
    }

    describe_metrics();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` unless [`init_metrics`] installed a recorder without a
/// listen address.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Completed pipeline sends by outcome");
    describe_counter!(TOKEN_REFRESH_TOTAL, "Credential refresh attempts by outcome");
    describe_counter!(RETRIES_TOTAL, "Request replays after a credential refresh");
    describe_gauge!(STAGE_QUEUE_DEPTH, "Active plus waiting activations per stage");
}

/// Records a completed `send`.
///
/// `outcome` is `"success"` or the failure's error category.
pub fn record_request(outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Records a credential refresh attempt.
pub fn record_refresh(outcome: &'static str) {
    counter!(TOKEN_REFRESH_TOTAL, "outcome" => outcome).increment(1);
}

/// Records a request replay.
pub fn record_retry(outcome: &'static str) {
    counter!(RETRIES_TOTAL, "outcome" => outcome).increment(1);
}

/// Records the current depth of a stage queue.
pub fn record_queue_depth(stage: &'static str, depth: usize) {
    gauge!(STAGE_QUEUE_DEPTH, "stage" => stage).set(depth as f64);
}
