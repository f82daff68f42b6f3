//! Serialized interceptor stages.
//!
//! A [`SerializedStage`] wraps an [`Interceptor`] with a [`StageQueue`] so
//! that at most one request is inside the interceptor's hooks at a time,
//! across all three hook kinds combined.
//!
//! A request holds its [`Activation`] for the whole span from `on_request`
//! to its eventual `on_response`/`on_error`, including the transport round
//! trip and any nested call a hook makes. A second request therefore cannot
//! enter the stage while the first one is refreshing a credential.
//!
//! ## Failure policy
//!
//! - A hook that panics becomes an implicit `Reject` with
//!   [`ClientError::HookPanicked`]
//! - With a hook timeout configured, a hook that does not finish in time
//!   becomes an implicit `Reject` with [`ClientError::HookTimeout`]
//!
//! In both cases the activation is still released when the caller drops it.

use crate::interceptor::{ErrorFlow, Flow, Hook, Interceptor, RequestFlow, ResponseFlow};
use crate::queue::{Activation, StageQueue};
use custodian_core::{ClientError, FailureEnvelope, RequestSpec, ResponseEnvelope};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// An interceptor with serialized, FIFO admission.
///
/// # Example
///
/// ```
/// use custodian_middleware::{FnInterceptor, Flow, SerializedStage};
/// use custodian_core::RequestSpec;
/// use std::time::Duration;
///
/// let stage = SerializedStage::new(FnInterceptor::new("noop", |r: RequestSpec| Flow::Proceed(r)))
///     .with_hook_timeout(Duration::from_secs(5));
///
/// assert_eq!(stage.name(), "noop");
/// assert!(stage.queue().is_idle());
/// ```
#[derive(Clone)]
pub struct SerializedStage {
    interceptor: Arc<dyn Interceptor>,
    queue: StageQueue,
    hook_timeout: Option<Duration>,
}

impl SerializedStage {
    /// Wraps an interceptor.
    pub fn new<I: Interceptor>(interceptor: I) -> Self {
        Self::from_arc(Arc::new(interceptor))
    }

    /// Wraps a shared interceptor.
    pub fn from_arc(interceptor: Arc<dyn Interceptor>) -> Self {
        let queue = StageQueue::new(interceptor.name());
        Self {
            interceptor,
            queue,
            hook_timeout: None,
        }
    }

    /// Sets the maximum time a single hook may run.
    #[must_use]
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = Some(timeout);
        self
    }

    /// Returns the wrapped interceptor's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.interceptor.name()
    }

    /// Returns the admission queue.
    #[must_use]
    pub fn queue(&self) -> &StageQueue {
        &self.queue
    }

    /// Returns the configured hook timeout.
    #[must_use]
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout
    }

    /// Waits for this stage's active slot.
    pub async fn admit(&self) -> Activation {
        self.queue.admit().await
    }

    /// Runs `on_request` inside an activation of this stage.
    pub async fn run_request(&self, activation: &Activation, request: RequestSpec) -> RequestFlow {
        self.check(activation);
        let origin = Arc::new(request.clone());
        let interceptor = Arc::clone(&self.interceptor);
        self.guarded(Hook::Request, (origin, None), async move {
            interceptor.on_request(request).await
        })
        .await
    }

    /// Runs `on_response` inside an activation of this stage.
    pub async fn run_response(
        &self,
        activation: &Activation,
        response: ResponseEnvelope,
    ) -> ResponseFlow {
        self.check(activation);
        let origin = (Arc::clone(response.request_arc()), Some(response.clone()));
        let interceptor = Arc::clone(&self.interceptor);
        self.guarded(Hook::Response, origin, async move {
            interceptor.on_response(response).await
        })
        .await
    }

    /// Runs `on_error` inside an activation of this stage.
    pub async fn run_error(&self, activation: &Activation, failure: FailureEnvelope) -> ErrorFlow {
        self.check(activation);
        let origin = (Arc::clone(&failure.request), failure.response.clone());
        let interceptor = Arc::clone(&self.interceptor);
        self.guarded(Hook::Error, origin, async move {
            interceptor.on_error(failure).await
        })
        .await
    }

    fn check(&self, activation: &Activation) {
        debug_assert_eq!(
            activation.stage(),
            self.name(),
            "activation used with the wrong stage"
        );
    }

    async fn guarded<T, F>(
        &self,
        hook: Hook,
        origin: (Arc<RequestSpec>, Option<ResponseEnvelope>),
        hook_future: F,
    ) -> Flow<T>
    where
        F: Future<Output = Flow<T>> + Send,
    {
        let stage = self.name();
        let guarded = AssertUnwindSafe(hook_future).catch_unwind();

        let outcome = match self.hook_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        stage,
                        hook = hook.as_str(),
                        timeout = ?limit,
                        "Interceptor hook timed out"
                    );
                    let (request, response) = origin;
                    return Flow::Reject(FailureEnvelope::new(
                        request,
                        response,
                        ClientError::HookTimeout {
                            stage: stage.to_string(),
                            hook: hook.as_str(),
                            elapsed: limit,
                        },
                    ));
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(flow) => {
                debug!(
                    stage,
                    hook = hook.as_str(),
                    flow = flow.label(),
                    "Interceptor hook finished"
                );
                flow
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(stage, hook = hook.as_str(), %message, "Interceptor hook panicked");
                let (request, response) = origin;
                Flow::Reject(FailureEnvelope::new(
                    request,
                    response,
                    ClientError::HookPanicked {
                        stage: stage.to_string(),
                        hook: hook.as_str(),
                        message,
                    },
                ))
            }
        }
    }
}

impl std::fmt::Debug for SerializedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedStage")
            .field("name", &self.name())
            .field("depth", &self.queue.depth())
            .field("hook_timeout", &self.hook_timeout)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
