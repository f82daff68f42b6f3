//! A configured client with CSRF token handling.

use std::sync::Arc;
use std::time::Duration;

use custodian_config::CustodianConfig;
use custodian_core::{CredentialCache, RequestSpec, SharedTransport, Transport, TransportResult};
use custodian_middleware::{
    CsrfInterceptor, Interceptor, Pipeline, PipelineBuilder, RefreshRequest, RetryInterceptor,
    SerializedStage,
};
use tracing::debug;

use crate::error::CustodianResult;
use crate::transport::ReqwestTransport;

/// An HTTP client whose requests run through a CSRF-aware pipeline.
///
/// Stage order, outermost first: any stages added on the builder, then
/// `retry`, then `csrf`. With CSRF disabled only the added stages remain.
///
/// # Example
///
/// ```no_run
/// use custodian::{CsrfClient, CustodianConfig, RequestSpec};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CsrfClient::from_config(&CustodianConfig::default())?;
/// match client.send(RequestSpec::post("/items")).await {
///     Ok(response) => println!("{}", response.status),
///     Err(failure) => println!("{}", failure.cause),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CsrfClient {
    pipeline: Pipeline,
    cache: CredentialCache,
}

impl CsrfClient {
    /// Builds a client backed by [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn from_config(config: &CustodianConfig) -> CustodianResult<Self> {
        CsrfClientBuilder::new(config.clone()).build()
    }

    /// Starts a builder for the given configuration.
    pub fn builder(config: CustodianConfig) -> CsrfClientBuilder {
        CsrfClientBuilder::new(config)
    }

    /// Sends a request through the pipeline.
    pub async fn send(&self, request: RequestSpec) -> TransportResult {
        self.pipeline.send(request).await
    }

    /// Returns the shared credential cache.
    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Returns the underlying pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Builder for [`CsrfClient`].
pub struct CsrfClientBuilder {
    config: CustodianConfig,
    transport: Option<SharedTransport>,
    cache: Option<CredentialCache>,
    stages: Vec<SerializedStage>,
}

impl std::fmt::Debug for CsrfClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("cache", &self.cache)
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl CsrfClientBuilder {
    /// Creates a builder for the given configuration.
    pub fn new(config: CustodianConfig) -> Self {
        Self {
            config,
            transport: None,
            cache: None,
            stages: Vec::new(),
        }
    }

    /// Uses a custom transport instead of [`ReqwestTransport`].
    #[must_use]
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Shares an existing credential cache.
    #[must_use]
    pub fn cache(mut self, cache: CredentialCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Adds a stage outside the built-in ones.
    #[must_use]
    pub fn stage(mut self, stage: SerializedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Adds an interceptor outside the built-in ones, using the configured
    /// hook timeout.
    #[must_use]
    pub fn interceptor<I: Interceptor>(self, interceptor: I) -> Self {
        let timeout = self.config.client.hook_timeout();
        let stage = with_timeout(SerializedStage::new(interceptor), timeout);
        self.stage(stage)
    }

    /// Validates the configuration and assembles the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn build(self) -> CustodianResult<CsrfClient> {
        self.config.validate()?;

        let transport: SharedTransport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&self.config.client)?),
        };
        let cache = self.cache.unwrap_or_default();
        let hook_timeout = self.config.client.hook_timeout();

        let mut builder = PipelineBuilder::new(Arc::clone(&transport));
        for stage in self.stages {
            builder = builder.stage(stage);
        }

        let csrf = &self.config.csrf;
        if csrf.enabled {
            let header = csrf.header()?;
            let refresh = RefreshRequest::new(csrf.method()?, csrf.refresh_path.clone());

            let retry = RetryInterceptor::new(cache.clone(), Arc::clone(&transport))
                .with_header(header.clone());
            let csrf = CsrfInterceptor::new(cache.clone(), Arc::clone(&transport))
                .with_header(header)
                .with_refresh_request(refresh);

            builder = builder
                .stage(with_timeout(SerializedStage::new(retry), hook_timeout))
                .stage(with_timeout(SerializedStage::new(csrf), hook_timeout));
        }

        let pipeline = builder.build();
        debug!(stages = ?pipeline.stage_names(), "Client pipeline assembled");

        Ok(CsrfClient { pipeline, cache })
    }
}

fn with_timeout(stage: SerializedStage, timeout: Option<Duration>) -> SerializedStage {
    match timeout {
        Some(timeout) => stage.with_hook_timeout(timeout),
        None => stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodian_config::{ClientConfig, CsrfConfig};
    use custodian_core::RequestSpec;
    use custodian_middleware::{Flow, FnInterceptor};
    use custodian_test::ScriptedTransport;

    #[test]
    fn test_default_stage_order() {
        let client = CsrfClient::builder(CustodianConfig::default())
            .transport(ScriptedTransport::new())
            .build()
            .unwrap();
        assert_eq!(client.pipeline().stage_names(), vec!["retry", "csrf"]);
    }

    #[test]
    fn test_custom_stage_is_outermost() {
        let client = CsrfClient::builder(CustodianConfig::default())
            .transport(ScriptedTransport::new())
            .interceptor(FnInterceptor::new("audit", |r: RequestSpec| Flow::Proceed(r)))
            .build()
            .unwrap();
        assert_eq!(client.pipeline().stage_names(), vec!["audit", "retry", "csrf"]);
    }

    #[test]
    fn test_csrf_disabled() {
        let config = CustodianConfig::builder()
            .csrf(CsrfConfig {
                enabled: false,
                ..Default::default()
            })
            .build();
        let client = CsrfClient::builder(config)
            .transport(ScriptedTransport::new())
            .build()
            .unwrap();
        assert_eq!(client.pipeline().stage_count(), 0);
    }

    #[test]
    fn test_hook_timeout_applied() {
        let config = CustodianConfig::builder()
            .client(ClientConfig {
                hook_timeout_ms: Some(250),
                ..Default::default()
            })
            .build();
        let client = CsrfClient::builder(config)
            .transport(ScriptedTransport::new())
            .build()
            .unwrap();
        for stage in client.pipeline().stages() {
            assert_eq!(stage.hook_timeout(), Some(Duration::from_millis(250)));
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CustodianConfig::builder()
            .csrf(CsrfConfig {
                header_name: "not a header".to_string(),
                ..Default::default()
            })
            .build();
        let result = CsrfClient::builder(config)
            .transport(ScriptedTransport::new())
            .build();
        assert!(matches!(result, Err(crate::CustodianError::Config(_))));
    }

    #[test]
    fn test_shared_cache() {
        let cache = CredentialCache::with_token("seed");
        let client = CsrfClient::builder(CustodianConfig::default())
            .transport(ScriptedTransport::new())
            .cache(cache.clone())
            .build()
            .unwrap();
        client.cache().set("next");
        assert_eq!(cache.get().as_deref(), Some("next"));
    }
}
