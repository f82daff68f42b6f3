//! Client-level CSRF flow tests.
//!
//! These build a [`CsrfClient`] from configuration and drive it against a
//! scripted transport, checking that the configured header and refresh
//! request are the ones on the wire.

use custodian::config::{ClientConfig, CsrfConfig};
use custodian::prelude::*;
use custodian_test::{Reply, ScriptedTransport};
use http::{Method, StatusCode};

fn config() -> CustodianConfig {
    CustodianConfig::builder()
        .client(ClientConfig {
            base_url: "https://api.example.com".to_string(),
            hook_timeout_ms: Some(1_000),
            ..Default::default()
        })
        .csrf(CsrfConfig {
            header_name: "x-xsrf-token".to_string(),
            refresh_method: "HEAD".to_string(),
            refresh_path: "/session".to_string(),
            ..Default::default()
        })
        .build()
}

fn client(transport: &ScriptedTransport) -> CsrfClient {
    CsrfClient::builder(config())
        .transport(transport.clone())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_configured_refresh_request_and_header() {
    let transport = ScriptedTransport::new();
    transport
        .replies("/orders", [Reply::unauthorized(), Reply::status(201)])
        .reply("/session", Reply::ok().header("x-xsrf-token", "fresh"));
    let client = client(&transport);
    client.cache().set("stale");

    let response = client.send(RequestSpec::post("/orders")).await.unwrap();

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(client.cache().get().as_deref(), Some("fresh"));

    let refresh = transport.requests_to("/session");
    assert_eq!(refresh.len(), 1);
    assert_eq!(refresh[0].method, Method::HEAD);
    assert_eq!(refresh[0].header_str("x-xsrf-token"), None);

    let attempts = transport.requests_to("/orders");
    assert_eq!(attempts[0].header_str("x-xsrf-token"), Some("stale"));
    assert_eq!(attempts[1].header_str("x-xsrf-token"), Some("fresh"));
    assert_eq!(attempts[1].header_str("x-csrf-token"), None);
}

#[tokio::test]
async fn test_http_errors_pass_through() {
    let transport = ScriptedTransport::new();
    transport.reply("/missing", Reply::status(404));
    let client = client(&transport);

    let failure = client.send(RequestSpec::get("/missing")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Http);
    assert_eq!(failure.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(transport.calls_to("/session"), 0);
}

#[tokio::test]
async fn test_disabled_csrf_leaves_401_alone() {
    let transport = ScriptedTransport::new();
    transport.reply("/orders", Reply::unauthorized().header("x-csrf-token", "ignored"));
    let config = CustodianConfig::builder()
        .csrf(CsrfConfig {
            enabled: false,
            ..Default::default()
        })
        .build();
    let client = CsrfClient::builder(config)
        .transport(transport.clone())
        .build()
        .unwrap();

    let failure = client.send(RequestSpec::post("/orders")).await.unwrap_err();

    assert_eq!(failure.cause.category(), ErrorCategory::Auth);
    assert!(client.cache().is_empty());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_clients_sharing_a_cache_share_tokens() {
    let transport = ScriptedTransport::new();
    transport
        .reply("/login", Reply::ok().header("x-xsrf-token", "t1"))
        .reply("/orders", Reply::ok());
    let cache = CredentialCache::new();
    let first = CsrfClient::builder(config())
        .transport(transport.clone())
        .cache(cache.clone())
        .build()
        .unwrap();
    let second = CsrfClient::builder(config())
        .transport(transport.clone())
        .cache(cache)
        .build()
        .unwrap();

    first.send(RequestSpec::get("/login")).await.unwrap();
    second.send(RequestSpec::get("/orders")).await.unwrap();

    assert_eq!(
        transport.requests_to("/orders")[0].header_str("x-xsrf-token"),
        Some("t1")
    );
}
