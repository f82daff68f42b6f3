//! Errors raised while loading or validating a [`CustodianConfig`](crate::CustodianConfig).

use std::path::PathBuf;
use thiserror::Error;

/// A configuration layer could not be applied, or the result is invalid.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration file does not exist.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A configuration file exists but could not be read.
    #[error("failed to read {path}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file or string is not valid TOML for the schema.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file or string is not valid JSON for the schema.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A `.env` file could not be loaded.
    #[error("failed to load .env file {path}: {reason}")]
    Dotenv {
        /// Path of the file.
        path: PathBuf,
        /// Why loading failed.
        reason: String,
    },

    /// An environment override has a value of the wrong shape.
    #[error("environment override {var}: {reason}")]
    EnvOverride {
        /// The environment variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A loaded value breaks a validation rule.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field, e.g. `csrf.header_name`.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Rejects the value of `field`.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env_override(var: &str, reason: &str) -> Self {
        Self::EnvOverride {
            var: var.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns the dotted field path for validation failures.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}
