//! End-to-end pipeline integration tests.
//!
//! These tests run the credential stages against a scripted transport:
//!
//! 1. Retry - replays a request once after a refresh
//! 2. CSRF - attaches, caches and refreshes the token

use custodian_core::{BoxFuture, CredentialCache, ErrorCategory, RequestSpec, SharedTransport};
use custodian_middleware::{
    stages::{CsrfInterceptor, RetryInterceptor, DEFAULT_CREDENTIAL_HEADER},
    Flow, FnInterceptor, Interceptor, Pipeline, RequestFlow, SerializedStage,
};
use custodian_test::{Gate, Reply, ScriptedTransport};
use http::StatusCode;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const HEADER: &str = DEFAULT_CREDENTIAL_HEADER;

/// Builds the retry (outer) + csrf (inner) pipeline over a scripted transport.
fn csrf_pipeline(transport: &ScriptedTransport, cache: &CredentialCache) -> Pipeline {
    let shared: SharedTransport = Arc::new(transport.clone());
    Pipeline::builder(Arc::clone(&shared))
        .interceptor(RetryInterceptor::new(cache.clone(), Arc::clone(&shared)))
        .interceptor(CsrfInterceptor::new(cache.clone(), shared))
        .build()
}

/// Yields until the outermost stage holds `depth` activations.
async fn wait_for_depth(pipeline: &Pipeline, depth: usize) {
    while pipeline.stages()[0].queue().depth() < depth {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Credential lifecycle
// ============================================================================

#[tokio::test]
async fn test_token_from_response_is_attached_to_later_requests() {
    let transport = ScriptedTransport::new();
    transport
        .reply("/x", Reply::ok().header(HEADER, "t1"))
        .reply("/z", Reply::ok());
    let cache = CredentialCache::new();
    let pipeline = csrf_pipeline(&transport, &cache);

    pipeline.send(RequestSpec::get("/x")).await.unwrap();
    pipeline.send(RequestSpec::get("/z")).await.unwrap();

    assert_eq!(transport.requests_to("/x")[0].header_str(HEADER), None);
    assert_eq!(transport.requests_to("/z")[0].header_str(HEADER), Some("t1"));
    assert_eq!(cache.get().as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_refresh_then_retry_scenario() {
    let transport = ScriptedTransport::new();
    transport
        .reply("/x", Reply::ok().header(HEADER, "t1"))
        .replies("/y", [Reply::unauthorized(), Reply::ok().body("created")])
        .reply("/", Reply::ok().header(HEADER, "t2"));
    let cache = CredentialCache::new();
    let pipeline = csrf_pipeline(&transport, &cache);

    pipeline.send(RequestSpec::get("/x")).await.unwrap();
    let response = pipeline
        .send(RequestSpec::post("/y").body("payload"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "created");
    assert_eq!(cache.get().as_deref(), Some("t2"));

    let attempts = transport.requests_to("/y");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].header_str(HEADER), Some("t1"));
    assert_eq!(attempts[1].header_str(HEADER), Some("t2"));
    assert_eq!(attempts[1].body, "payload");
    assert_eq!(transport.calls_to("/"), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_reported_instead_of_401() {
    let transport = ScriptedTransport::new();
    transport
        .reply("/y", Reply::unauthorized())
        .reply("/", Reply::status(500));
    let cache = CredentialCache::with_token("t1");
    let pipeline = csrf_pipeline(&transport, &cache);

    let failure = pipeline.send(RequestSpec::post("/y")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Refresh);
    assert_eq!(failure.cause.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(transport.calls_to("/y"), 1);
    assert_eq!(cache.get().as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_refresh_without_token_is_reported() {
    let transport = ScriptedTransport::new();
    transport
        .reply("/y", Reply::unauthorized())
        .reply("/", Reply::ok());
    let pipeline = csrf_pipeline(&transport, &CredentialCache::new());

    let failure = pipeline.send(RequestSpec::post("/y")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Refresh);
    assert_eq!(transport.calls_to("/y"), 1);
}

#[tokio::test]
async fn test_second_401_after_refresh_is_final() {
    let transport = ScriptedTransport::new();
    transport
        .replies("/y", [Reply::unauthorized(), Reply::unauthorized()])
        .reply("/", Reply::ok().header(HEADER, "t2"));
    let pipeline = csrf_pipeline(&transport, &CredentialCache::with_token("t1"));

    let failure = pipeline.send(RequestSpec::post("/y")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Auth);
    assert_eq!(failure.request.header_str(HEADER), Some("t2"));
    assert_eq!(transport.calls_to("/y"), 2);
    assert_eq!(transport.calls_to("/"), 1);
}

#[tokio::test]
async fn test_transport_error_is_not_retried() {
    let transport = ScriptedTransport::new();
    transport.reply("/y", Reply::transport_error("connection refused"));
    let pipeline = csrf_pipeline(&transport, &CredentialCache::with_token("t1"));

    let failure = pipeline.send(RequestSpec::post("/y")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Transport);
    assert!(failure.response.is_none());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_other_http_errors_pass_through() {
    let transport = ScriptedTransport::new();
    transport.reply("/y", Reply::status(403));
    let pipeline = csrf_pipeline(&transport, &CredentialCache::with_token("t1"));

    let failure = pipeline.send(RequestSpec::post("/y")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Http);
    assert_eq!(failure.status(), Some(StatusCode::FORBIDDEN));
    assert_eq!(transport.call_count(), 1);
}

// ============================================================================
// Serialization
// ============================================================================

#[tokio::test]
async fn test_slow_refresh_holds_back_the_next_request() {
    let gate = Gate::new();
    let transport = ScriptedTransport::new();
    transport
        .replies("/a", [Reply::unauthorized(), Reply::ok()])
        .reply("/", Reply::ok().header(HEADER, "t2").gate(&gate))
        .reply("/b", Reply::ok());
    let cache = CredentialCache::with_token("t1");
    let pipeline = csrf_pipeline(&transport, &cache);

    let first = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.send(RequestSpec::post("/a")).await })
    };
    transport.wait_for_calls("/", 1).await;

    let second = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.send(RequestSpec::get("/b")).await })
    };
    wait_for_depth(&pipeline, 2).await;

    // the second request is queued, not on the wire
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.calls_to("/b"), 0);
    assert!(!second.is_finished());

    gate.open();
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());

    assert_eq!(transport.calls_to("/"), 1);
    assert_eq!(transport.requests_to("/b")[0].header_str(HEADER), Some("t2"));
    assert!(pipeline.stages().iter().all(|s| s.queue().is_idle()));
}

#[tokio::test]
async fn test_cancelled_send_releases_every_stage() {
    let gate = Gate::new();
    let transport = ScriptedTransport::new();
    transport
        .reply("/slow", Reply::ok().gate(&gate))
        .reply("/next", Reply::ok());
    let pipeline = csrf_pipeline(&transport, &CredentialCache::new());

    let slow = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.send(RequestSpec::get("/slow")).await })
    };
    transport.wait_for_calls("/slow", 1).await;

    slow.abort();
    let _ = slow.await;

    assert!(pipeline.send(RequestSpec::get("/next")).await.is_ok());
    assert!(pipeline.stages().iter().all(|s| s.queue().is_idle()));
}

/// Records the order in which requests enter the stage.
fn entry_recorder(order: &Arc<Mutex<Vec<String>>>) -> impl Interceptor {
    let order = Arc::clone(order);
    FnInterceptor::new("recorder", move |request: RequestSpec| {
        order.lock().unwrap().push(request.path.clone());
        Flow::Proceed(request)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_stage_entry_follows_submission_order(
        names in prop::collection::vec("[a-z]{1,6}", 1..8)
    ) {
        tokio_test::block_on(async {
            let gate = Gate::new();
            let transport = ScriptedTransport::new();
            transport
                .reply("/hold", Reply::ok().gate(&gate))
                .fallback(Reply::ok());

            let order = Arc::new(Mutex::new(Vec::new()));
            let pipeline = Pipeline::builder(transport.clone())
                .interceptor(entry_recorder(&order))
                .build();

            let mut handles = Vec::new();
            let mut submitted = vec!["/hold".to_string()];
            {
                let pipeline = pipeline.clone();
                handles.push(tokio::spawn(async move {
                    pipeline.send(RequestSpec::get("/hold")).await
                }));
            }
            transport.wait_for_calls("/hold", 1).await;

            for (i, name) in names.iter().enumerate() {
                let path = format!("/{i}-{name}");
                submitted.push(path.clone());
                let pipeline_clone = pipeline.clone();
                handles.push(tokio::spawn(async move {
                    pipeline_clone.send(RequestSpec::get(path)).await
                }));
                wait_for_depth(&pipeline, i + 2).await;
            }

            gate.open();
            for handle in handles {
                assert!(handle.await.unwrap().is_ok());
            }

            assert_eq!(*order.lock().unwrap(), submitted);
        });
    }
}

// ============================================================================
// Determinism
// ============================================================================

fn scripted_scenario() -> ScriptedTransport {
    let transport = ScriptedTransport::new();
    transport
        .reply("/x", Reply::ok().header(HEADER, "t1"))
        .replies("/y", [Reply::unauthorized(), Reply::ok().body("ok")])
        .reply("/", Reply::ok().header(HEADER, "t2"))
        .reply("/z", Reply::status(404));
    transport
}

async fn run_scenario() -> (Vec<Option<u16>>, Option<String>, Vec<RequestSpec>) {
    let transport = scripted_scenario();
    let cache = CredentialCache::new();
    let pipeline = csrf_pipeline(&transport, &cache);

    let mut outcomes = Vec::new();
    for request in [
        RequestSpec::get("/x"),
        RequestSpec::post("/y"),
        RequestSpec::get("/z"),
    ] {
        let outcome = match pipeline.send(request).await {
            Ok(response) => Some(response.status.as_u16()),
            Err(failure) => failure.status().map(|s| s.as_u16()),
        };
        outcomes.push(outcome);
    }

    (outcomes, cache.get(), transport.requests())
}

#[tokio::test]
async fn test_replaying_a_script_is_deterministic() {
    let first = run_scenario().await;
    let second = run_scenario().await;

    assert_eq!(first, second);
    assert_eq!(first.0, vec![Some(200), Some(200), Some(404)]);
    assert_eq!(first.1.as_deref(), Some("t2"));
}

// ============================================================================
// Hook failures
// ============================================================================

struct Exploding;

impl Interceptor for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn on_request(&self, request: RequestSpec) -> BoxFuture<'_, RequestFlow> {
        Box::pin(async move {
            if request.path == "/boom" {
                panic!("interceptor bug");
            }
            Flow::Proceed(request)
        })
    }
}

#[tokio::test]
async fn test_panicking_hook_rejects_and_stage_stays_usable() {
    let transport = ScriptedTransport::new();
    transport.fallback(Reply::ok());
    let pipeline = Pipeline::builder(transport.clone())
        .interceptor(Exploding)
        .build();

    let failure = pipeline.send(RequestSpec::get("/boom")).await.unwrap_err();
    assert_eq!(failure.cause.category(), ErrorCategory::Hook);
    assert_eq!(transport.call_count(), 0);

    assert!(pipeline.send(RequestSpec::get("/fine")).await.is_ok());
}

struct Stalling;

impl Interceptor for Stalling {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn on_request(&self, request: RequestSpec) -> BoxFuture<'_, RequestFlow> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Flow::Proceed(request)
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_hook_timeout_rejects() {
    let transport = ScriptedTransport::new();
    transport.fallback(Reply::ok());
    let pipeline = Pipeline::builder(transport.clone())
        .stage(SerializedStage::new(Stalling).with_hook_timeout(Duration::from_secs(1)))
        .build();

    let failure = pipeline.send(RequestSpec::get("/x")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Hook);
    assert!(failure.cause.to_string().contains("timed out"));
    assert_eq!(transport.call_count(), 0);
    assert!(pipeline.stages()[0].queue().is_idle());
}


#[tokio::test(start_paused = true)]
async fn test_hung_refresh_times_out_and_next_request_proceeds() {
    let transport = ScriptedTransport::new();
    let never = Gate::new();
    transport
        .reply("/y", Reply::unauthorized())
        .reply("/", Reply::ok().header(HEADER, "t2").gate(&never))
        .reply("/z", Reply::ok());
    let cache = CredentialCache::with_token("t1");
    let shared: SharedTransport = Arc::new(transport.clone());
    let pipeline = Pipeline::builder(Arc::clone(&shared))
        .interceptor(RetryInterceptor::new(cache.clone(), Arc::clone(&shared)))
        .stage(
            SerializedStage::new(CsrfInterceptor::new(cache.clone(), shared))
                .with_hook_timeout(Duration::from_secs(1)),
        )
        .build();

    let failure = pipeline.send(RequestSpec::post("/y")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Hook);
    assert_eq!(cache.get().as_deref(), Some("t1"));
    assert_eq!(transport.calls_to("/y"), 1);
    assert!(pipeline.stages().iter().all(|stage| stage.queue().is_idle()));

    let response = pipeline.send(RequestSpec::get("/z")).await.unwrap();
    assert!(response.is_success());
    assert_eq!(transport.requests_to("/z")[0].header_str(HEADER), Some("t1"));
}
