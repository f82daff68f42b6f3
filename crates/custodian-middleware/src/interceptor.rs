//! The interceptor contract.
//!
//! An [`Interceptor`] observes and mutates traffic at three points:
//!
//! - `on_request` - before the request reaches the transport
//! - `on_response` - after a successful (2xx) response
//! - `on_error` - after a failure (transport error or non-2xx status)
//!
//! Every hook returns a [`Flow`] that says how processing continues. Because
//! the flow is the hook's return value, a hook cannot continue twice or forget
//! to continue at all.
//!
//! # Example
//!
//! ```
//! use custodian_core::{BoxFuture, RequestSpec};
//! use custodian_middleware::{Flow, Interceptor, RequestFlow};
//! use http::{HeaderName, HeaderValue};
//!
//! struct UserAgent;
//!
//! impl Interceptor for UserAgent {
//!     fn name(&self) -> &'static str {
//!         "user_agent"
//!     }
//!
//!     fn on_request(&self, request: RequestSpec) -> BoxFuture<'_, RequestFlow> {
//!         Box::pin(async move {
//!             Flow::Proceed(request.header(
//!                 HeaderName::from_static("user-agent"),
//!                 HeaderValue::from_static("custodian"),
//!             ))
//!         })
//!     }
//! }
//! ```

use custodian_core::{BoxFuture, FailureEnvelope, RequestSpec, ResponseEnvelope};
use std::fmt;

/// How processing continues after a hook.
#[derive(Debug)]
pub enum Flow<T> {
    /// Continue with the (possibly modified) envelope.
    Proceed(T),
    /// Short-circuit the remaining inner chain with a successful response.
    ///
    /// Outer stages still see the response through their `on_response` hook.
    Resolve(ResponseEnvelope),
    /// Fail terminally. No further hooks run.
    Reject(FailureEnvelope),
}

impl<T> Flow<T> {
    /// Returns true if this flow continues with the same kind of envelope.
    pub const fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed(_))
    }

    /// Returns a short label for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Proceed(_) => "proceed",
            Self::Resolve(_) => "resolve",
            Self::Reject(_) => "reject",
        }
    }
}

/// Flow returned by `on_request`.
pub type RequestFlow = Flow<RequestSpec>;

/// Flow returned by `on_response`.
pub type ResponseFlow = Flow<ResponseEnvelope>;

/// Flow returned by `on_error`.
pub type ErrorFlow = Flow<FailureEnvelope>;

/// Identifies a hook, for logs and error causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// `on_request`
    Request,
    /// `on_response`
    Response,
    /// `on_error`
    Error,
}

impl Hook {
    /// Returns the hook's method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "on_request",
            Self::Response => "on_response",
            Self::Error => "on_error",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of request/response processing.
///
/// All hooks default to pass-through, so an interceptor only implements the
/// hooks it cares about.
///
/// # Invariants
///
/// - A hook that does not handle its envelope returns it unchanged with
///   `Proceed` (or `Reject` for a failure it wants to end)
/// - Interceptors must not assume they are serialized unless wrapped in a
///   [`SerializedStage`](crate::SerializedStage); a bare interceptor may see
///   several requests at once
pub trait Interceptor: Send + Sync + 'static {
    /// Returns the unique name of this interceptor.
    ///
    /// This name is used for logging, metrics, and error causes.
    fn name(&self) -> &'static str;

    /// Called before the request is dispatched.
    fn on_request(&self, request: RequestSpec) -> BoxFuture<'_, RequestFlow> {
        Box::pin(async move { Flow::Proceed(request) })
    }

    /// Called with a successful response.
    fn on_response(&self, response: ResponseEnvelope) -> BoxFuture<'_, ResponseFlow> {
        Box::pin(async move { Flow::Proceed(response) })
    }

    /// Called with a failure.
    fn on_error(&self, failure: FailureEnvelope) -> BoxFuture<'_, ErrorFlow> {
        Box::pin(async move { Flow::Proceed(failure) })
    }
}

/// An interceptor built from a synchronous request closure.
///
/// Useful for header decoration and other stateless request rewrites.
///
/// # Example
///
/// ```
/// use custodian_core::RequestSpec;
/// use custodian_middleware::{Flow, FnInterceptor};
///
/// let tag = FnInterceptor::new("tag", |request: RequestSpec| {
///     Flow::Proceed(request.query("source", "sdk"))
/// });
/// ```
pub struct FnInterceptor<F> {
    name: &'static str,
    func: F,
}

impl<F> FnInterceptor<F> {
    /// Creates a new function-based interceptor.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(RequestSpec) -> RequestFlow + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_request(&self, request: RequestSpec) -> BoxFuture<'_, RequestFlow> {
        let flow = (self.func)(request);
        Box::pin(async move { flow })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodian_core::ClientError;
    use std::sync::Arc;

    struct PassThrough;

    impl Interceptor for PassThrough {
        fn name(&self) -> &'static str {
            "pass_through"
        }
    }

    #[tokio::test]
    async fn test_default_hooks_pass_through() {
        let interceptor = PassThrough;
        let request = RequestSpec::get("/x").query("a", "1");

        let flow = interceptor.on_request(request.clone()).await;
        match flow {
            Flow::Proceed(out) => assert_eq!(out, request),
            other => panic!("expected proceed, got {}", other.label()),
        }

        let failure = FailureEnvelope::transport(Arc::new(request), "refused");
        let flow = interceptor.on_error(failure).await;
        assert!(flow.is_proceed());
    }

    #[tokio::test]
    async fn test_fn_interceptor_rewrites_request() {
        let interceptor = FnInterceptor::new("tag", |request: RequestSpec| {
            Flow::Proceed(request.query("source", "sdk"))
        });

        assert_eq!(interceptor.name(), "tag");
        match interceptor.on_request(RequestSpec::get("/x")).await {
            Flow::Proceed(out) => {
                assert_eq!(out.query.get("source").map(String::as_str), Some("sdk"));
            }
            other => panic!("expected proceed, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_fn_interceptor_can_reject() {
        let interceptor = FnInterceptor::new("guard", |request: RequestSpec| {
            Flow::Reject(FailureEnvelope::new(
                Arc::new(request),
                None,
                ClientError::rejected("guard", "blocked"),
            ))
        });

        let flow = interceptor.on_request(RequestSpec::delete("/x")).await;
        assert_eq!(flow.label(), "reject");
    }

    #[test]
    fn test_hook_names() {
        assert_eq!(Hook::Request.as_str(), "on_request");
        assert_eq!(Hook::Response.to_string(), "on_response");
        assert_eq!(Hook::Error.as_str(), "on_error");
    }
}
