//! Request, response and failure envelopes.
//!
//! These are the values that flow through the interceptor pipeline:
//!
//! - [`RequestSpec`] - an outgoing request, mutable until it is dispatched
//! - [`ResponseEnvelope`] - a received response with a back-reference to its request
//! - [`FailureEnvelope`] - a failed request with an optional response and a cause

use crate::error::{ClientError, ClientResult};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An outgoing request.
///
/// The path is relative to the transport's base target. Query parameters are
/// kept in a sorted map so that request construction is deterministic.
///
/// # Example
///
/// ```
/// use custodian_core::RequestSpec;
///
/// let request = RequestSpec::get("/items")
///     .query("page", "2")
///     .try_header("x-trace", "abc")
///     .unwrap();
///
/// assert_eq!(request.path, "/items");
/// assert_eq!(request.header_str("x-trace"), Some("abc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// HTTP method
    pub method: Method,
    /// Request path, relative to the base target
    pub path: String,
    /// Query parameters
    pub query: BTreeMap<String, String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl RequestSpec {
    /// Creates a request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a new GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a new POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a new PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a new PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Creates a new DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Sets a typed header on the request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a header from string parts.
    ///
    /// Returns `ClientError::InvalidRequest` if the name or value is not a
    /// valid HTTP header.
    pub fn try_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> ClientResult<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ClientError::invalid_request(format!("invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ClientError::invalid_request(format!("invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the raw request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the request body as JSON.
    ///
    /// This also sets the `Content-Type` header to `application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> ClientResult<Self> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ClientError::invalid_request(format!("JSON encoding failed: {e}")))?;
        self.body = Bytes::from(bytes);
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }
}

/// A response received from the transport.
///
/// The originating request is kept as a shared, read-only reference.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub body: Bytes,
    request: Arc<RequestSpec>,
}

impl ResponseEnvelope {
    /// Creates a response for the given request.
    pub fn new(
        request: Arc<RequestSpec>,
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            request,
        }
    }

    /// Returns the request this response answers.
    #[must_use]
    pub fn request(&self) -> &RequestSpec {
        &self.request
    }

    /// Returns the shared handle to the originating request.
    #[must_use]
    pub fn request_arc(&self) -> &Arc<RequestSpec> {
        &self.request
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// A failed request.
///
/// `response` is present only when the transport produced an HTTP response
/// (for example a 401). Transport-level failures carry no response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} {} failed", .request.method, .request.path)]
pub struct FailureEnvelope {
    /// The request that failed
    pub request: Arc<RequestSpec>,
    /// The response, when one was received
    pub response: Option<ResponseEnvelope>,
    /// Why the request failed
    #[source]
    pub cause: ClientError,
}

impl FailureEnvelope {
    /// Creates a failure with an explicit cause.
    pub fn new(
        request: Arc<RequestSpec>,
        response: Option<ResponseEnvelope>,
        cause: ClientError,
    ) -> Self {
        Self {
            request,
            response,
            cause,
        }
    }

    /// Creates a failure for a transport error (no response).
    pub fn transport(request: Arc<RequestSpec>, message: impl Into<String>) -> Self {
        Self::new(request, None, ClientError::transport(message))
    }

    /// Creates a failure from a non-success response, classifying its status.
    pub fn from_response(response: ResponseEnvelope) -> Self {
        let cause = ClientError::from_status(response.status);
        Self {
            request: Arc::clone(response.request_arc()),
            response: Some(response),
            cause,
        }
    }

    /// Returns the status of the attached response, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Returns true for a 401 with a response present.
    ///
    /// Transport failures are never treated as refreshable.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        self.cause.is_retryable_auth() && self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
