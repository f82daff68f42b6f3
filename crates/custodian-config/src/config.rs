//! Main configuration types.
//!
//! This module provides the top-level [`CustodianConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{ClientConfig, ConfigError, CsrfConfig, LogFormat, TelemetryConfigSection};

/// Complete Custodian client configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use custodian_config::CustodianConfig;
///
/// let config = CustodianConfig::default();
/// assert_eq!(config.csrf.header_name, "x-csrf-token");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct CustodianConfig {
    /// HTTP client configuration.
    #[serde(default)]
    pub client: ClientConfig,

    /// CSRF token configuration.
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Telemetry configuration (logging, metrics).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl CustodianConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use custodian_config::{ClientConfig, CustodianConfig};
    ///
    /// let config = CustodianConfig::builder()
    ///     .client(ClientConfig {
    ///         base_url: "https://api.example.com".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.client.base_url, "https://api.example.com");
    /// ```
    #[must_use]
    pub fn builder() -> CustodianConfigBuilder {
        CustodianConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The base URL is not an absolute http(s) URL
    /// - A timeout is zero
    /// - The credential header or refresh method does not parse
    /// - The refresh path does not start with `/`
    /// - The log filter is invalid
    /// - The metrics address is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = &self.client.base_url;
        let host = base_url
            .strip_prefix("https://")
            .or_else(|| base_url.strip_prefix("http://"));
        if host.map_or(true, str::is_empty) {
            return Err(ConfigError::invalid_value(
                "client.base_url",
                format!("expected an absolute http(s) URL, got {base_url:?}"),
            ));
        }

        if self.client.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "client.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.client.hook_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "client.hook_timeout_ms",
                "must be greater than zero when set",
            ));
        }

        self.csrf.header()?;
        self.csrf.method()?;

        if !self.csrf.refresh_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "csrf.refresh_path",
                format!("must start with '/', got {:?}", self.csrf.refresh_path),
            ));
        }

        if custodian_telemetry::logging::create_env_filter(&self.telemetry.logging.level).is_err() {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                format!("invalid filter directive: {}", self.telemetry.logging.level),
            ));
        }

        if let Some(addr) = &self.telemetry.metrics.addr {
            if self.telemetry.metrics.enabled && addr.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::invalid_value(
                    "telemetry.metrics.addr",
                    format!("invalid socket address: {addr}"),
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// - Pretty log formatting with source locations
    /// - Debug log level
    /// - Five second hook timeout
    ///
    /// # Example
    ///
    /// ```
    /// use custodian_config::CustodianConfig;
    ///
    /// let config = CustodianConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.logging.span_events = true;

        config.client.hook_timeout_ms = Some(5_000);

        config
    }

    /// Create a production configuration preset.
    ///
    /// - JSON log formatting
    /// - Info log level
    /// - Metrics recorder enabled
    /// - Thirty second hook timeout
    ///
    /// # Example
    ///
    /// ```
    /// use custodian_config::{CustodianConfig, LogFormat};
    ///
    /// let config = CustodianConfig::production();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.metrics.enabled = true;

        config.client.hook_timeout_ms = Some(30_000);

        config
    }
}

/// Builder for [`CustodianConfig`].
#[derive(Debug, Default)]
pub struct CustodianConfigBuilder {
    client: Option<ClientConfig>,
    csrf: Option<CsrfConfig>,
    telemetry: Option<TelemetryConfigSection>,
}

impl CustodianConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client configuration.
    #[must_use]
    pub fn client(mut self, client: ClientConfig) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the CSRF configuration.
    #[must_use]
    pub fn csrf(mut self, csrf: CsrfConfig) -> Self {
        self.csrf = Some(csrf);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> CustodianConfig {
        CustodianConfig {
            client: self.client.unwrap_or_default(),
            csrf: self.csrf.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<CustodianConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
