//! Messages endpoint integration tests (buffered mode)
//!
//! Tests for `POST /v1/messages` when the request does not ask for a stream:
//! - Credential and version resolution
//! - Upstream status and body passthrough
//! - Response header allow-list
//! - Error envelopes for client, gateway and internal failures
//! - Caller disconnect while waiting on the upstream

use std::time::Duration;

use anthropic_relay::{proxy::ChannelWriter, MessagesRelay, RelayOutcome};
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{constants, header_values, refused_url, test_config, test_server};
use crate::mocks::{
    spawn_hanging_upstream, spawn_truncating_upstream, AnthropicTestData, MockAnthropic,
};

const WAIT: Duration = Duration::from_secs(5);

/// Response head promising 100 bytes followed by only 5 of them
const TRUNCATED_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
    content-type: application/json\r\n\
    content-length: 100\r\n\r\n\
    {\"id\"";

fn name(s: &'static str) -> HeaderName {
    HeaderName::from_static(s)
}

fn value(s: &str) -> HeaderValue {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_buffered_success_passthrough() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_success(AnthropicTestData::message_response())
        .await;
    let server = test_server(test_config(&upstream.uri()));

    let response = server
        .post("/v1/messages")
        .json(&AnthropicTestData::message_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, AnthropicTestData::message_response());
    assert_eq!(response.header("content-type"), "application/json");
}

#[tokio::test]
async fn test_only_allow_listed_response_headers_are_copied() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_success(AnthropicTestData::message_response())
        .await;
    let server = test_server(test_config(&upstream.uri()));

    let response = server
        .post("/v1/messages")
        .json(&AnthropicTestData::message_request())
        .await;

    let headers = response.headers();
    assert_eq!(headers.get("request-id").unwrap(), "req_test_123");
    assert!(headers.get("anthropic-organization-id").is_none());
    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_upstream_error_status_passed_through_unmodified() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_status(529, r#"{"type":"overloaded_error"}"#)
        .await;
    let server = test_server(test_config(&upstream.uri()));

    let response = server
        .post("/v1/messages")
        .json(&json!({"stream": false}))
        .await;

    assert_eq!(response.status_code().as_u16(), 529);
    assert_eq!(response.text(), r#"{"type":"overloaded_error"}"#);
    assert_eq!(response.header("retry-after"), "30");
}

#[tokio::test]
async fn test_missing_api_key_returns_400_without_upstream_call() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_success(AnthropicTestData::message_response())
        .await;
    let mut config = test_config(&upstream.uri());
    config.anthropic_api_key = String::new();
    let server = test_server(config);

    let response = server.post("/v1/messages").json(&json!({"model": "x"})).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({"error": "missing Anthropic API key; set X-Api-Key header or ANTHROPIC_API_KEY"})
    );
    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_missing_version_returns_400() {
    let upstream = MockAnthropic::start().await;
    let mut config = test_config(&upstream.uri());
    config.anthropic_version = "  ".to_string();
    let server = test_server(config);

    let response = server
        .post("/v1/messages")
        .json(&AnthropicTestData::message_request())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body["error"],
        "missing Anthropic API version; set Anthropic-Version header or ANTHROPIC_VERSION"
    );
    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_upstream_returns_502() {
    let server = test_server(test_config(&refused_url().await));

    let response = server
        .post("/v1/messages")
        .json(&AnthropicTestData::message_request())
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body, json!({"error": "failed to reach Anthropic Messages API"}));
}

#[tokio::test]
async fn test_caller_headers_override_defaults() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_success(AnthropicTestData::message_response())
        .await;
    let server = test_server(test_config(&upstream.uri()));

    server
        .post("/v1/messages")
        .add_header(name("x-api-key"), value(constants::CALLER_API_KEY))
        .add_header(name("anthropic-version"), value("2024-10-22"))
        .add_header(name("anthropic-beta"), value(" tools-2024-04-04 , , pdfs-2024-09-25"))
        .json(&AnthropicTestData::message_request())
        .await
        .assert_status_ok();

    let request = upstream.single_request().await;
    assert_eq!(header_values(&request, "x-api-key"), vec![constants::CALLER_API_KEY]);
    assert_eq!(header_values(&request, "anthropic-version"), vec!["2024-10-22"]);
    assert_eq!(
        header_values(&request, "anthropic-beta"),
        vec!["tools-2024-04-04", "pdfs-2024-09-25"]
    );
}

#[tokio::test]
async fn test_defaults_are_sent_upstream() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_success(AnthropicTestData::message_response())
        .await;
    let mut config = test_config(&format!("{}/", upstream.uri()));
    config.anthropic_beta = "a,b".to_string();
    let server = test_server(config);

    server
        .post("/v1/messages")
        .json(&AnthropicTestData::message_request())
        .await
        .assert_status_ok();

    let request = upstream.single_request().await;
    assert_eq!(request.url.path(), "/v1/messages");
    assert_eq!(header_values(&request, "x-api-key"), vec![constants::TEST_API_KEY]);
    assert_eq!(header_values(&request, "anthropic-version"), vec![constants::TEST_VERSION]);
    assert_eq!(header_values(&request, "anthropic-beta"), vec!["a", "b"]);
    // No accept of our own on buffered requests; the client's generic one applies.
    assert_eq!(header_values(&request, "accept"), vec!["*/*"]);
    assert!(header_values(&request, "user-agent")[0].starts_with("anthropic-relay/"));
}

#[tokio::test]
async fn test_body_forwarded_unmodified() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_success(AnthropicTestData::message_response())
        .await;
    let server = test_server(test_config(&upstream.uri()));
    let raw = br#"{ "model" : "x",  "messages":[] , "extra": {"kept": true} }"#;

    server
        .post("/v1/messages")
        .bytes(raw.to_vec().into())
        .await
        .assert_status_ok();

    let request = upstream.single_request().await;
    assert_eq!(request.body, raw.to_vec());
    assert_eq!(header_values(&request, "content-type"), vec!["application/json"]);
}

#[tokio::test]
async fn test_malformed_body_is_relayed_buffered() {
    let upstream = MockAnthropic::start().await;
    upstream
        .mock_message_status(400, r#"{"type":"error","error":{"type":"invalid_request_error"}}"#)
        .await;
    let server = test_server(test_config(&upstream.uri()));

    let response = server
        .post("/v1/messages")
        .add_header(name("accept"), value("text/event-stream"))
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let request = upstream.single_request().await;
    assert_eq!(header_values(&request, "accept"), vec!["*/*"]);
    assert_eq!(header_values(&request, "content-type"), vec!["text/plain"]);
}

#[tokio::test]
async fn test_truncated_upstream_body_returns_502() {
    let upstream = spawn_truncating_upstream(TRUNCATED_RESPONSE).await;
    let server = test_server(test_config(&upstream));

    let response = server
        .post("/v1/messages")
        .json(&AnthropicTestData::message_request())
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({"error": "failed to read response from Anthropic Messages API"})
    );
}

/// Run a buffered request through the relay, dropping the caller's side once
/// the upstream has the request, and return what the relay reported
async fn relay_then_disconnect(partial: &'static [u8]) -> RelayOutcome {
    let upstream = spawn_hanging_upstream(partial).await;
    let relay = MessagesRelay::new(reqwest::Client::new(), &test_config(&upstream.uri));

    let (mut writer, channel) = ChannelWriter::new();
    let task = tokio::spawn(async move {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/messages")
            .body(Body::from(r#"{"model": "x"}"#))
            .unwrap();
        relay.handle(request, &mut writer).await
    });

    tokio::time::timeout(WAIT, upstream.received)
        .await
        .expect("upstream should receive the request")
        .unwrap();
    drop(channel);

    let outcome = tokio::time::timeout(WAIT, task)
        .await
        .expect("relay should stop after the caller disconnects")
        .unwrap();
    tokio::time::timeout(WAIT, upstream.hung_up)
        .await
        .expect("relay should close the upstream connection")
        .unwrap();
    outcome
}

#[tokio::test]
async fn test_caller_disconnect_during_dispatch() {
    match relay_then_disconnect(b"").await {
        RelayOutcome::Pending(response) => assert_eq!(response.status.as_u16(), 499),
        other => panic!("expected a pending 499, got {:?}", other),
    }
}

#[tokio::test]
async fn test_caller_disconnect_during_buffered_read() {
    match relay_then_disconnect(TRUNCATED_RESPONSE).await {
        RelayOutcome::Pending(response) => assert_eq!(response.status.as_u16(), 499),
        other => panic!("expected a pending 499, got {:?}", other),
    }
}
