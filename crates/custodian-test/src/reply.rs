//! Scripted replies.

use crate::error::{TestError, TestResult};
use bytes::Bytes;
use custodian_core::{FailureEnvelope, RequestSpec, ResponseEnvelope, TransportResult};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A canned answer for one transport call.
///
/// # Example
///
/// ```
/// use custodian_test::Reply;
///
/// let reply = Reply::ok().header("x-csrf-token", "t1").body("hello");
/// let refused = Reply::transport_error("connection refused");
/// ```
#[derive(Debug, Clone)]
pub struct Reply {
    kind: ReplyKind,
    delay: Option<Duration>,
    gate: Option<Gate>,
}

#[derive(Debug, Clone)]
enum ReplyKind {
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },
    TransportError(String),
}

impl Reply {
    /// Creates a reply with the given status code.
    pub fn status(status: u16) -> Self {
        Self {
            kind: ReplyKind::Response {
                status,
                headers: Vec::new(),
                body: Bytes::new(),
            },
            delay: None,
            gate: None,
        }
    }

    /// Creates a `200 OK` reply.
    pub fn ok() -> Self {
        Self::status(200)
    }

    /// Creates a `401 Unauthorized` reply.
    pub fn unauthorized() -> Self {
        Self::status(401)
    }

    /// Creates a transport failure with no response.
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::TransportError(message.into()),
            delay: None,
            gate: None,
        }
    }

    /// Adds a response header. Ignored for transport failures.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let ReplyKind::Response { headers, .. } = &mut self.kind {
            headers.push((name.into(), value.into()));
        }
        self
    }

    /// Sets the response body. Ignored for transport failures.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        if let ReplyKind::Response { body: slot, .. } = &mut self.kind {
            *slot = body.into();
        }
        self
    }

    /// Sets the response body as JSON.
    pub fn json<T: serde::Serialize>(self, value: &T) -> TestResult<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header("content-type", "application/json")
            .body(body))
    }

    /// Waits this long before answering.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Holds the answer until the gate opens.
    #[must_use]
    pub fn gate(mut self, gate: &Gate) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    pub(crate) async fn respond(self, request: RequestSpec) -> TransportResult {
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let request = Arc::new(request);
        match self.kind {
            ReplyKind::TransportError(message) => Err(FailureEnvelope::transport(request, message)),
            ReplyKind::Response {
                status,
                headers,
                body,
            } => match build_parts(status, &headers) {
                Ok((status, headers)) => Ok(ResponseEnvelope::new(request, status, headers, body)),
                Err(error) => Err(FailureEnvelope::transport(request, error.to_string())),
            },
        }
    }
}

fn build_parts(status: u16, headers: &[(String, String)]) -> TestResult<(StatusCode, HeaderMap)> {
    let status = StatusCode::from_u16(status).map_err(|_| TestError::InvalidStatus(status))?;
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))?;
        map.append(name, value);
    }
    Ok((status, map))
}

/// A latch that holds gated replies until it is opened.
///
/// Once open, a gate stays open.
#[derive(Debug, Clone)]
pub struct Gate {
    state: Arc<watch::Sender<bool>>,
}

impl Gate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Opens the gate, releasing every waiter.
    pub fn open(&self) {
        self.state.send_replace(true);
    }

    /// Returns true once the gate has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits until the gate is open.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives as long as self, so this cannot fail
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodian_core::ErrorCategory;

    #[tokio::test]
    async fn test_response_reply() {
        let response = Reply::status(201)
            .header("x-csrf-token", "t1")
            .body("created")
            .respond(RequestSpec::post("/items"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.header_str("x-csrf-token"), Some("t1"));
        assert_eq!(response.text(), "created");
        assert_eq!(response.request().path, "/items");
    }

    #[tokio::test]
    async fn test_transport_error_reply() {
        let failure = Reply::transport_error("connection reset")
            .respond(RequestSpec::get("/"))
            .await
            .unwrap_err();

        assert_eq!(failure.cause.category(), ErrorCategory::Transport);
        assert!(failure.response.is_none());
    }

    #[tokio::test]
    async fn test_invalid_header_becomes_transport_error() {
        let failure = Reply::ok()
            .header("bad header", "v")
            .respond(RequestSpec::get("/"))
            .await
            .unwrap_err();

        assert!(failure.cause.to_string().contains("Invalid header"));
    }

    #[tokio::test]
    async fn test_json_reply() {
        let response = Reply::ok()
            .json(&serde_json::json!({"token": "t9"}))
            .unwrap()
            .respond(RequestSpec::get("/"))
            .await
            .unwrap();

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["token"], "t9");
        assert_eq!(response.header_str("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_gate_holds_reply_until_open() {
        let gate = Gate::new();
        let pending = tokio::spawn(Reply::ok().gate(&gate).respond(RequestSpec::get("/")));

        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        assert!(!gate.is_open());

        gate.open();
        assert!(pending.await.unwrap().is_ok());
        // an open gate does not block later waiters
        gate.wait().await;
    }
}
