//! Replay-once interceptor.
//!
//! Sits outside [`CsrfInterceptor`](super::CsrfInterceptor). When a 401
//! reaches it, the inner stage has already refreshed the credential, so the
//! failed request is cloned, given the current cached token and sent once
//! more, straight to the transport. The replay does not go back through the
//! pipeline, and its own failure is final.

use super::{attach_token, token_from, DEFAULT_CREDENTIAL_HEADER};
use crate::interceptor::{ErrorFlow, Flow, Interceptor};
use custodian_core::{dispatch, BoxFuture, CredentialCache, FailureEnvelope, SharedTransport};
use custodian_telemetry::metrics::record_retry;
use http::HeaderName;
use tracing::{info, warn};

/// Replays a request once after an authorization failure.
pub struct RetryInterceptor {
    cache: CredentialCache,
    transport: SharedTransport,
    header: HeaderName,
}

impl RetryInterceptor {
    /// Stage name.
    pub const NAME: &'static str = "retry";

    /// Creates the interceptor with the default credential header.
    pub fn new(cache: CredentialCache, transport: SharedTransport) -> Self {
        Self {
            cache,
            transport,
            header: HeaderName::from_static(DEFAULT_CREDENTIAL_HEADER),
        }
    }

    /// Sets the credential header name.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    async fn replay(&self, failure: FailureEnvelope) -> ErrorFlow {
        let mut request = (*failure.request).clone();
        if let Some(token) = self.cache.get() {
            if request.header_str(&self.header) != Some(token.as_str()) {
                request = attach_token(request, &self.header, &token);
            }
        }

        info!(
            stage = Self::NAME,
            http.method = %request.method,
            http.path = %request.path,
            "Replaying request with refreshed credential"
        );

        match dispatch(&self.transport, request).await {
            Ok(response) => {
                record_retry("success");
                if let Some(token) = token_from(&response.headers, &self.header) {
                    self.cache.set(token);
                }
                Flow::Resolve(response)
            }
            Err(second) => {
                record_retry("failure");
                warn!(stage = Self::NAME, error = %second.cause, "Replay failed");
                Flow::Reject(second)
            }
        }
    }
}

impl std::fmt::Debug for RetryInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryInterceptor")
            .field("cache", &self.cache)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl Interceptor for RetryInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_error(&self, failure: FailureEnvelope) -> BoxFuture<'_, ErrorFlow> {
        Box::pin(async move {
            if failure.is_auth_failure() {
                self.replay(failure).await
            } else {
                Flow::Proceed(failure)
            }
        })
    }
}
