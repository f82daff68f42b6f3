//! # Custodian Core
//!
//! Core types for the Custodian HTTP client pipeline.
//!
//! This crate provides the foundational types used throughout Custodian:
//!
//! - [`RequestSpec`] - An outgoing request, mutable until dispatch
//! - [`ResponseEnvelope`] - A received response with a back-reference to its request
//! - [`FailureEnvelope`] - A failed request with an optional response and its cause
//! - [`ClientError`] - The failure taxonomy (transport, auth, refresh, HTTP, ...)
//! - [`CredentialCache`] - The shared CSRF token slot
//! - [`Transport`] - The contract for the underlying HTTP transport

#![doc(html_root_url = "https://docs.rs/custodian-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod credential;
mod error;
mod transport;
mod types;

pub use credential::CredentialCache;
pub use error::{ClientError, ClientResult, ErrorCategory};
pub use transport::{classify, dispatch, BoxFuture, SharedTransport, Transport, TransportResult};
pub use types::{FailureEnvelope, RequestSpec, ResponseEnvelope};
