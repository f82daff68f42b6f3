//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// HTTP client configuration section.
///
/// # Example
///
/// ```
/// use custodian_config::ClientConfig;
///
/// let config = ClientConfig {
///     base_url: "https://api.example.com".to_string(),
///     request_timeout_ms: 10_000,
///     hook_timeout_ms: Some(2_000),
/// };
/// assert_eq!(config.request_timeout().as_secs(), 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL every request path is joined to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Transport timeout per request in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum time a single interceptor hook may run, in milliseconds.
    /// None disables the hook timeout.
    #[serde(default)]
    pub hook_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Returns the request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the hook timeout, if any.
    #[must_use]
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
            hook_timeout_ms: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30000
}

/// CSRF token configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CsrfConfig {
    /// Enable the CSRF and retry stages.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Header carrying the token on requests and responses.
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Method of the token refresh request.
    #[serde(default = "default_refresh_method")]
    pub refresh_method: String,

    /// Path of the token refresh request.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
}

impl CsrfConfig {
    /// Parses the header name.
    pub fn header(&self) -> Result<http::HeaderName, ConfigError> {
        http::HeaderName::from_bytes(self.header_name.as_bytes())
            .map_err(|e| ConfigError::invalid_value("csrf.header_name", e.to_string()))
    }

    /// Parses the refresh method.
    pub fn method(&self) -> Result<http::Method, ConfigError> {
        http::Method::from_bytes(self.refresh_method.to_uppercase().as_bytes())
            .map_err(|e| ConfigError::invalid_value("csrf.refresh_method", e.to_string()))
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: default_header_name(),
            refresh_method: default_refresh_method(),
            refresh_path: default_refresh_path(),
        }
    }
}

fn default_header_name() -> String {
    "x-csrf-token".to_string()
}

fn default_refresh_method() -> String {
    "GET".to_string()
}

fn default_refresh_path() -> String {
    "/".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,

    /// Log span open and close events.
    #[serde(default)]
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
            span_events: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl From<&LoggingConfig> for custodian_telemetry::LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.enabled,
            level: config.level.clone(),
            json_format: config.format == LogFormat::Json,
            span_events: config.span_events,
            file_line_info: config.include_location,
            thread_ids: false,
            include_target: true,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,

    /// Address to serve `/metrics` on.
    #[serde(default)]
    pub addr: Option<String>,
}

impl From<&MetricsConfig> for custodian_telemetry::MetricsConfig {
    fn from(config: &MetricsConfig) -> Self {
        Self {
            enabled: config.enabled,
            addr: config.addr.clone(),
        }
    }
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TelemetryConfigSection {
    /// Converts the section into the telemetry crate's runtime configuration.
    #[must_use]
    pub fn to_telemetry(&self) -> custodian_telemetry::TelemetryConfig {
        custodian_telemetry::TelemetryConfig {
            logging: (&self.logging).into(),
            metrics: (&self.metrics).into(),
        }
    }
}

fn default_true() -> bool {
    true
}
