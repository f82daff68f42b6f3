//! Typed configuration for the Custodian HTTP client.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides, optionally read from a `.env` file
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! The configuration system is built around the [`CustodianConfig`] struct:
//!
//! - [`ClientConfig`] - base URL and timeouts
//! - [`CsrfConfig`] - credential header and refresh request
//! - [`TelemetryConfigSection`] - logging and metrics
//!
//! # Example
//!
//! ```no_run
//! use custodian_config::{ConfigLoader, CustodianConfig};
//!
//! # fn main() -> Result<(), custodian_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("custodian.toml")?
//!     .with_dotenv()
//!     .with_env_prefix("CUSTODIAN")
//!     .load()?;
//!
//! println!("Requests go to: {}", config.client.base_url);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [client]
//! base_url = "https://api.example.com"
//! request_timeout_ms = 30000
//! hook_timeout_ms = 5000
//!
//! [csrf]
//! enabled = true
//! header_name = "x-csrf-token"
//! refresh_method = "GET"
//! refresh_path = "/"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "127.0.0.1:9464"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. For example:
//!
//! - `CUSTODIAN__CLIENT__BASE_URL=https://staging.example.com`
//! - `CUSTODIAN__CSRF__REFRESH_PATH=/session`
//! - `CUSTODIAN__TELEMETRY__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
