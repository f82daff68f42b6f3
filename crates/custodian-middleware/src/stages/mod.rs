//! Built-in interceptors.
//!
//! The credential flow uses two stages, outermost first:
//!
//! 1. [`retry`] - replays a request once after its credential was refreshed
//! 2. [`csrf`] - attaches, caches and refreshes the CSRF token
//!
//! ```text
//! send → retry.on_request → csrf.on_request → transport
//!                                                 ↓ 401
//! Resolve(200) ← retry.on_error (replay) ← csrf.on_error (refresh) ←┘
//! ```
//!
//! Both stages share one [`CredentialCache`](custodian_core::CredentialCache)
//! and the same credential header name.

pub mod csrf;
pub mod retry;

pub use csrf::{CsrfInterceptor, RefreshRequest, DEFAULT_CREDENTIAL_HEADER};
pub use retry::RetryInterceptor;

use custodian_core::RequestSpec;
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Sets `header` to `token`, replacing any previous value.
///
/// A token that is not a valid header value leaves the request unchanged.
pub(crate) fn attach_token(
    mut request: RequestSpec,
    header: &HeaderName,
    token: &str,
) -> RequestSpec {
    match HeaderValue::from_str(token) {
        Ok(value) => {
            request.headers.insert(header.clone(), value);
        }
        Err(_) => warn!(header = %header, "Credential is not a valid header value, not attached"),
    }
    request
}

/// Reads a non-empty token from `headers`.
pub(crate) fn token_from(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}
