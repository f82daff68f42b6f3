//! # Custodian
//!
//! **HTTP client interceptor pipeline with serialized stages and CSRF token refresh**
//!
//! Custodian runs every outgoing request through an ordered list of stages.
//! Each stage may observe or rewrite the request, the response, or the
//! failure, and each admits one request at a time in arrival order.
//!
//! - **Serialized stages**: a stage's hooks never run concurrently with themselves
//! - **CSRF tokens**: cached, attached, refreshed after a 401, and the failed
//!   request retried once
//! - **Typed configuration**: TOML/JSON files with environment overrides
//! - **Observability**: structured logs via `tracing`, Prometheus metrics
//!
//! ## Quick Start
//!
//! ```no_run
//! use custodian::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("custodian.toml")?
//!         .with_env_prefix("CUSTODIAN")
//!         .load()?;
//!
//!     custodian::init_telemetry(&config)?;
//!
//!     let client = CsrfClient::from_config(&config)?;
//!     let response = client.send(RequestSpec::post("/orders")).await;
//!     println!("{:?}", response.map(|r| r.status));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! send → [custom] → retry → csrf → Transport
//!                                      ↓
//! result ← [custom] ← retry ← csrf ←───┘
//! ```

#![doc(html_root_url = "https://docs.rs/custodian/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod transport;

pub use client::{CsrfClient, CsrfClientBuilder};
pub use error::{CustodianError, CustodianResult};
pub use transport::ReqwestTransport;

// Re-export core types
pub use custodian_core as core;
pub use custodian_core::{
    ClientError, CredentialCache, ErrorCategory, FailureEnvelope, RequestSpec, ResponseEnvelope,
    Transport, TransportResult,
};

// Re-export middleware types
pub use custodian_middleware as middleware;

// Re-export configuration types
pub use custodian_config as config;
pub use custodian_config::{ConfigLoader, CustodianConfig};

// Re-export telemetry types
pub use custodian_telemetry as telemetry;

/// Installs logging and metrics as described by the configuration.
///
/// # Errors
///
/// Returns an error if a global subscriber or recorder is already installed
/// or the metrics listener cannot bind.
pub fn init_telemetry(config: &CustodianConfig) -> CustodianResult<()> {
    custodian_telemetry::init_telemetry(&config.telemetry.to_telemetry())?;
    Ok(())
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use custodian::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{CsrfClient, CustodianError, CustodianResult, ReqwestTransport};

    pub use custodian_core::{
        ClientError, CredentialCache, ErrorCategory, FailureEnvelope, RequestSpec,
        ResponseEnvelope, Transport, TransportResult,
    };

    pub use custodian_middleware::{
        Flow, FnInterceptor, Interceptor, Pipeline, SerializedStage,
    };

    pub use custodian_config::{ConfigLoader, CustodianConfig};
}
