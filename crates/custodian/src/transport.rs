//! `reqwest`-backed transport.

use std::sync::Arc;
use std::time::Duration;

use custodian_config::ClientConfig;
use custodian_core::{
    BoxFuture, FailureEnvelope, RequestSpec, ResponseEnvelope, Transport, TransportResult,
};
use reqwest::Client;
use tracing::debug;

/// Sends requests to a base URL with [`reqwest`].
///
/// Every HTTP response is returned as `Ok`; connection failures, timeouts
/// and body read errors become transport failures without a response.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    /// Creates a transport from the client configuration section.
    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    /// Wraps an existing `reqwest` client.
    ///
    /// `timeout` is informational here; the client's own settings apply.
    pub fn with_client(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// Returns the base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Joins a request path onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send(&self, request: RequestSpec) -> TransportResult {
        let url = self.url_for(&request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let request = Arc::new(request);

        let response = builder.send().await.map_err(|e| {
            debug!(url = %url, error = %e, "Request failed before a response arrived");
            FailureEnvelope::transport(Arc::clone(&request), format!("request failed: {e}"))
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            FailureEnvelope::transport(Arc::clone(&request), format!("failed to read body: {e}"))
        })?;

        Ok(ResponseEnvelope::new(request, status, headers, body))
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: RequestSpec) -> BoxFuture<'_, TransportResult> {
        Box::pin(self.send(request))
    }
}
