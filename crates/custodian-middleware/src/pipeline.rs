//! Ordered interceptor pipeline.
//!
//! The pipeline composes [`SerializedStage`]s with a [`Transport`]:
//!
//! ```text
//! send(request) → stage[0].on_request → … → stage[n].on_request → transport
//!                                                                    ↓
//! result        ← stage[0].on_response/on_error ← … ← stage[n] ←─────┘
//! ```
//!
//! ## Flow semantics
//!
//! | Hook | `Proceed` | `Resolve(response)` | `Reject(failure)` |
//! |------|-----------|---------------------|-------------------|
//! | `on_request` | next stage / transport | skip inner stages and transport; outer stages unwind with `on_response` | terminal failure |
//! | `on_response` | next outer stage | same as `Proceed` | terminal failure |
//! | `on_error` | next outer stage's `on_error` | outer stages unwind with `on_response` | terminal failure |
//!
//! A response outside the 2xx range is turned into a failure (see
//! [`classify`](custodian_core::classify)) before the unwind starts.
//!
//! Each stage's activation is held from its `on_request` until its unwind
//! hook returns, and released as soon as the request leaves the stage.

use crate::interceptor::{Flow, Interceptor};
use crate::queue::Activation;
use crate::stage::SerializedStage;
use custodian_core::{
    dispatch, FailureEnvelope, RequestSpec, ResponseEnvelope, SharedTransport, Transport,
    TransportResult,
};
use custodian_telemetry::metrics::record_request;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// The interceptor pipeline of an HTTP client.
///
/// # Example
///
/// ```
/// use custodian_core::{CredentialCache, RequestSpec, SharedTransport};
/// use custodian_middleware::{CsrfInterceptor, Pipeline, RetryInterceptor};
/// use custodian_test::{Reply, ScriptedTransport};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new();
/// transport.reply("/items", Reply::ok().header("x-csrf-token", "t1"));
///
/// let cache = CredentialCache::new();
/// let shared: SharedTransport = Arc::new(transport.clone());
/// let pipeline = Pipeline::builder(Arc::clone(&shared))
///     .interceptor(RetryInterceptor::new(cache.clone(), Arc::clone(&shared)))
///     .interceptor(CsrfInterceptor::new(cache.clone(), shared))
///     .build();
///
/// let response = pipeline.send(RequestSpec::get("/items")).await.unwrap();
/// assert!(response.is_success());
/// assert_eq!(cache.get().as_deref(), Some("t1"));
/// # });
/// ```
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<SerializedStage>,
    transport: SharedTransport,
}

/// Outcome of the request walk.
enum Entered {
    Dispatch(RequestSpec),
    Resolved(ResponseEnvelope),
    Rejected(FailureEnvelope),
}

impl Pipeline {
    /// Creates a new pipeline builder around a transport.
    pub fn builder<T: Transport>(transport: T) -> PipelineBuilder {
        PipelineBuilder::new(Arc::new(transport))
    }

    /// Sends a request through every stage and the transport.
    ///
    /// Returns the final response (possibly from a retried request) or the
    /// terminal failure.
    pub async fn send(&self, request: RequestSpec) -> TransportResult {
        let span = info_span!(
            "custodian.send",
            http.method = %request.method,
            http.path = %request.path,
        );

        async move {
            let result = self.run(request).await;
            match &result {
                Ok(response) => {
                    debug!(status = %response.status, "Request succeeded");
                    record_request("success");
                }
                Err(failure) => {
                    debug!(error = %failure.cause, "Request failed");
                    record_request(failure.cause.category().as_str());
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: RequestSpec) -> TransportResult {
        let mut entered: Vec<(&SerializedStage, Activation)> =
            Vec::with_capacity(self.stages.len());

        let mut result = match self.enter(request, &mut entered).await {
            Entered::Dispatch(request) => dispatch(&self.transport, request).await,
            Entered::Resolved(response) => Ok(response),
            Entered::Rejected(failure) => return Err(failure),
        };

        while let Some((stage, activation)) = entered.pop() {
            result = match result {
                Ok(response) => match stage.run_response(&activation, response).await {
                    Flow::Proceed(response) | Flow::Resolve(response) => Ok(response),
                    Flow::Reject(failure) => return Err(failure),
                },
                Err(failure) => match stage.run_error(&activation, failure).await {
                    Flow::Proceed(failure) => Err(failure),
                    Flow::Resolve(response) => Ok(response),
                    Flow::Reject(failure) => return Err(failure),
                },
            };
            drop(activation);
        }

        result
    }

    async fn enter<'a>(
        &'a self,
        mut request: RequestSpec,
        entered: &mut Vec<(&'a SerializedStage, Activation)>,
    ) -> Entered {
        for stage in &self.stages {
            let activation = stage.admit().await;
            request = match stage.run_request(&activation, request).await {
                Flow::Proceed(request) => request,
                Flow::Resolve(response) => return Entered::Resolved(response),
                Flow::Reject(failure) => return Entered::Rejected(failure),
            };
            entered.push((stage, activation));
        }
        Entered::Dispatch(request)
    }

    /// Returns the stages in request order.
    #[must_use]
    pub fn stages(&self) -> &[SerializedStage] {
        &self.stages
    }

    /// Returns the names of all stages in request order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(SerializedStage::name).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// Stages run their request hooks in the order they are added and their
/// response/error hooks in reverse order.
pub struct PipelineBuilder {
    stages: Vec<SerializedStage>,
    transport: SharedTransport,
}

impl PipelineBuilder {
    /// Creates a builder with no stages.
    #[must_use]
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            stages: Vec::new(),
            transport,
        }
    }

    /// Adds a pre-built stage.
    #[must_use]
    pub fn stage(mut self, stage: SerializedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Wraps an interceptor in a [`SerializedStage`] and adds it.
    #[must_use]
    pub fn interceptor<I: Interceptor>(self, interceptor: I) -> Self {
        self.stage(SerializedStage::new(interceptor))
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            transport: self.transport,
        }
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}
