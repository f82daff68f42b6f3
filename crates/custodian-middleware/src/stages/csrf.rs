//! CSRF token interceptor.
//!
//! Keeps the shared [`CredentialCache`] in step with the server:
//!
//! - `on_request` attaches the cached token under the credential header
//! - `on_response` caches a token the server returned
//! - `on_error` refreshes the token after a 401 and points the failed
//!   request at the new token, so an outer [`RetryInterceptor`] can replay it
//!
//! A failed refresh ends the request with a [`ClientError::Refresh`] cause
//! instead of the original 401.
//!
//! After a successful refresh the proceeded failure's `request` carries the
//! new token, while its `response` still answers the request that was
//! actually sent. `failure.request` and `failure.response.request()` differ
//! from then on; replays use `failure.request`.
//!
//! [`RetryInterceptor`]: super::RetryInterceptor
//!
//! ## Example
//!
//! ```
//! use custodian_core::CredentialCache;
//! use custodian_middleware::stages::{CsrfInterceptor, RefreshRequest};
//! use custodian_test::ScriptedTransport;
//! use http::Method;
//! use std::sync::Arc;
//!
//! let cache = CredentialCache::new();
//! let transport = Arc::new(ScriptedTransport::new());
//!
//! let csrf = CsrfInterceptor::new(cache.clone(), transport)
//!     .with_refresh_request(RefreshRequest::new(Method::HEAD, "/session"));
//! assert_eq!(csrf.refresh_request().path, "/session");
//! ```

use super::{attach_token, token_from};
use crate::interceptor::{ErrorFlow, Flow, Interceptor, RequestFlow, ResponseFlow};
use custodian_core::{
    dispatch, BoxFuture, ClientError, CredentialCache, FailureEnvelope, RequestSpec,
    ResponseEnvelope, SharedTransport,
};
use custodian_telemetry::metrics::record_refresh;
use http::{HeaderName, Method};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default credential header, used on requests and responses.
pub const DEFAULT_CREDENTIAL_HEADER: &str = "x-csrf-token";

/// The request issued to obtain a fresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// HTTP method
    pub method: Method,
    /// Request path
    pub path: String,
}

impl RefreshRequest {
    /// Creates a refresh request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    fn to_spec(&self) -> RequestSpec {
        RequestSpec::new(self.method.clone(), self.path.clone())
    }
}

impl Default for RefreshRequest {
    fn default() -> Self {
        Self::new(Method::GET, "/")
    }
}

/// Attaches, caches and refreshes the CSRF token.
pub struct CsrfInterceptor {
    cache: CredentialCache,
    transport: SharedTransport,
    header: HeaderName,
    refresh: RefreshRequest,
}

impl CsrfInterceptor {
    /// Stage name.
    pub const NAME: &'static str = "csrf";

    /// Creates the interceptor with the default header and refresh request.
    ///
    /// `transport` is used for the refresh call only.
    pub fn new(cache: CredentialCache, transport: SharedTransport) -> Self {
        Self {
            cache,
            transport,
            header: HeaderName::from_static(DEFAULT_CREDENTIAL_HEADER),
            refresh: RefreshRequest::default(),
        }
    }

    /// Sets the credential header name.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Sets the refresh request.
    pub fn with_refresh_request(mut self, refresh: RefreshRequest) -> Self {
        self.refresh = refresh;
        self
    }

    /// Returns the credential header name.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Returns the refresh request.
    pub fn refresh_request(&self) -> &RefreshRequest {
        &self.refresh
    }

    async fn refresh(&self, failure: FailureEnvelope) -> ErrorFlow {
        info!(
            stage = Self::NAME,
            failed_path = %failure.request.path,
            refresh_path = %self.refresh.path,
            "Refreshing credential after 401"
        );

        // the stale token is not sent with the refresh call
        let cause = match dispatch(&self.transport, self.refresh.to_spec()).await {
            Ok(response) => match token_from(&response.headers, &self.header) {
                Some(token) => {
                    self.cache.set(token.clone());
                    record_refresh("success");
                    info!(stage = Self::NAME, "Credential refreshed");

                    let request = attach_token((*failure.request).clone(), &self.header, &token);
                    return Flow::Proceed(FailureEnvelope {
                        request: Arc::new(request),
                        ..failure
                    });
                }
                None => {
                    record_refresh("missing_token");
                    ClientError::refresh(
                        format!("response carried no {} header", self.header),
                        Some(response.status),
                    )
                }
            },
            Err(refresh_failure) => {
                record_refresh("failure");
                ClientError::refresh(refresh_failure.cause.to_string(), refresh_failure.status())
            }
        };

        warn!(stage = Self::NAME, error = %cause, "Credential refresh failed");
        Flow::Reject(FailureEnvelope::new(failure.request, failure.response, cause))
    }
}

impl std::fmt::Debug for CsrfInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfInterceptor")
            .field("cache", &self.cache)
            .field("header", &self.header)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl Interceptor for CsrfInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_request(&self, request: RequestSpec) -> BoxFuture<'_, RequestFlow> {
        let request = match self.cache.get() {
            Some(token) => attach_token(request, &self.header, &token),
            None => request,
        };
        Box::pin(async move { Flow::Proceed(request) })
    }

    fn on_response(&self, response: ResponseEnvelope) -> BoxFuture<'_, ResponseFlow> {
        if let Some(token) = token_from(&response.headers, &self.header) {
            if self.cache.get().as_deref() != Some(token.as_str()) {
                debug!(stage = Self::NAME, "Caching credential from response");
                self.cache.set(token);
            }
        }
        Box::pin(async move { Flow::Proceed(response) })
    }

    fn on_error(&self, failure: FailureEnvelope) -> BoxFuture<'_, ErrorFlow> {
        Box::pin(async move {
            if failure.is_auth_failure() {
                self.refresh(failure).await
            } else {
                Flow::Proceed(failure)
            }
        })
    }
}
