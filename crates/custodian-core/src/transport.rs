//! The transport contract.
//!
//! A [`Transport`] turns a [`RequestSpec`] into a [`ResponseEnvelope`]. It owns
//! connection handling, TLS and encoding; the pipeline treats it as opaque.
//!
//! Transports report only transport-level failures as errors. Whether a
//! status code counts as success is decided by [`classify`], so that the
//! pipeline and the interceptors that issue nested calls agree on it.

use crate::types::{FailureEnvelope, RequestSpec, ResponseEnvelope};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future used by transports and interceptor hooks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a single transport call.
pub type TransportResult = Result<ResponseEnvelope, FailureEnvelope>;

/// A shared, type-erased transport.
pub type SharedTransport = Arc<dyn Transport>;

/// Executes requests against a base target.
///
/// # Example
///
/// ```
/// use custodian_core::{BoxFuture, RequestSpec, ResponseEnvelope, Transport, TransportResult};
/// use http::{HeaderMap, StatusCode};
/// use std::sync::Arc;
///
/// struct AlwaysOk;
///
/// impl Transport for AlwaysOk {
///     fn execute(&self, request: RequestSpec) -> BoxFuture<'_, TransportResult> {
///         Box::pin(async move {
///             Ok(ResponseEnvelope::new(Arc::new(request), StatusCode::OK, HeaderMap::new(), ""))
///         })
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Sends the request and waits for the response.
    ///
    /// Any HTTP response, whatever its status, is returned as `Ok`.
    fn execute(&self, request: RequestSpec) -> BoxFuture<'_, TransportResult>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: RequestSpec) -> BoxFuture<'_, TransportResult> {
        (**self).execute(request)
    }
}

/// Converts a non-success response into a failure.
///
/// 2xx responses pass through; everything else becomes a [`FailureEnvelope`]
/// carrying the response, with 401 classified as an auth failure.
pub fn classify(result: TransportResult) -> TransportResult {
    match result {
        Ok(response) if response.is_success() => Ok(response),
        Ok(response) => Err(FailureEnvelope::from_response(response)),
        Err(failure) => Err(failure),
    }
}

/// Executes a request and classifies the result.
pub async fn dispatch<T: Transport + ?Sized>(
    transport: &T,
    request: RequestSpec,
) -> TransportResult {
    classify(transport.execute(request).await)
}
