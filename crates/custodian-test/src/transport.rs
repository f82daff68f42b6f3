//! In-memory scripted transport.

use crate::error::TestError;
use crate::reply::Reply;
use custodian_core::{BoxFuture, FailureEnvelope, RequestSpec, Transport, TransportResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A [`Transport`] that answers from per-path scripts and records every call.
///
/// Each path has its own FIFO of [`Reply`]s. When a path's script is empty
/// the fallback reply is used; without a fallback the call fails with a
/// transport error naming the unscripted request.
///
/// Clones share scripts and the call log.
///
/// # Example
///
/// ```
/// use custodian_core::{dispatch, RequestSpec};
/// use custodian_test::{Reply, ScriptedTransport};
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new();
/// transport.reply("/x", Reply::ok().header("x-csrf-token", "t1"));
///
/// let response = dispatch(&transport, RequestSpec::get("/x")).await.unwrap();
/// assert_eq!(response.header_str("x-csrf-token"), Some("t1"));
/// assert_eq!(transport.calls_to("/x"), 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<Option<Reply>>,
    log: Mutex<Vec<RequestSpec>>,
}

impl ScriptedTransport {
    /// Creates a transport with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next unanswered call to `path`.
    pub fn reply(&self, path: impl Into<String>, reply: Reply) -> &Self {
        self.inner
            .scripts
            .lock()
            .entry(path.into())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queues several replies for `path`, answered in order.
    pub fn replies(
        &self,
        path: impl Into<String>,
        replies: impl IntoIterator<Item = Reply>,
    ) -> &Self {
        self.inner
            .scripts
            .lock()
            .entry(path.into())
            .or_default()
            .extend(replies);
        self
    }

    /// Sets the reply used when a path has no scripted reply left.
    pub fn fallback(&self, reply: Reply) -> &Self {
        *self.inner.fallback.lock() = Some(reply);
        self
    }

    /// Returns every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RequestSpec> {
        self.inner.log.lock().clone()
    }

    /// Returns the requests received for `path`, in arrival order.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RequestSpec> {
        self.inner
            .log
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    /// Returns the number of calls received for `path`.
    #[must_use]
    pub fn calls_to(&self, path: &str) -> usize {
        self.inner.log.lock().iter().filter(|r| r.path == path).count()
    }

    /// Returns the total number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.log.lock().len()
    }

    /// Returns the number of replies still queued for `path`.
    #[must_use]
    pub fn pending(&self, path: &str) -> usize {
        self.inner.scripts.lock().get(path).map_or(0, VecDeque::len)
    }

    /// Yields until `path` has received at least `count` calls.
    pub async fn wait_for_calls(&self, path: &str, count: usize) {
        while self.calls_to(path) < count {
            tokio::task::yield_now().await;
        }
    }

    fn next_reply(&self, path: &str) -> Option<Reply> {
        let scripted = self
            .inner
            .scripts
            .lock()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        scripted.or_else(|| self.inner.fallback.lock().clone())
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: RequestSpec) -> BoxFuture<'_, TransportResult> {
        self.inner.log.lock().push(request.clone());
        let reply = self.next_reply(&request.path);

        Box::pin(async move {
            match reply {
                Some(reply) => reply.respond(request).await,
                None => {
                    let error = TestError::Unscripted {
                        method: request.method.to_string(),
                        path: request.path.clone(),
                    };
                    Err(FailureEnvelope::transport(Arc::new(request), error.to_string()))
                }
            }
        })
    }
}
