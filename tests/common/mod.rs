//! Common test utilities for the relay
//!
//! Shared fixtures and helpers for building the real router against a mock
//! upstream, either in-process (`axum-test`) or on a real socket.

#![allow(dead_code)]

use std::sync::Arc;

use anthropic_relay::{routes, AppState, Config};
use axum_test::TestServer;
use tokio::net::TcpListener;

/// Test configuration constants
pub mod constants {
    /// Default credential configured on the relay
    pub const TEST_API_KEY: &str = "sk-ant-test-default";
    /// Credential sent by callers that bring their own
    pub const CALLER_API_KEY: &str = "sk-ant-test-caller";
    /// Default protocol version configured on the relay
    pub const TEST_VERSION: &str = "2023-06-01";
}

/// Relay configuration pointing at `upstream`, with default key and version
pub fn test_config(upstream: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        anthropic_base_url: upstream.to_string(),
        anthropic_api_key: constants::TEST_API_KEY.to_string(),
        anthropic_version: constants::TEST_VERSION.to_string(),
        ..Config::default()
    }
}

/// In-process test server for the full router
pub fn test_server(config: Config) -> TestServer {
    let state = Arc::new(AppState::with_client(&config, reqwest::Client::new()));
    TestServer::new(routes::create_router(state)).expect("Failed to create test server")
}

/// Serve the full router on a real socket, returning its base URL
pub async fn spawn_app(config: Config) -> String {
    let state = Arc::new(AppState::with_client(&config, reqwest::Client::new()));
    let app = routes::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    format!("http://{}", addr)
}

/// Base URL of a port nothing is listening on
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{}", addr)
}

/// Values of a header on a request captured by the mock upstream
pub fn header_values(request: &wiremock::Request, name: &str) -> Vec<String> {
    request
        .headers
        .get_all(name)
        .iter()
        .map(|v| v.to_str().unwrap_or_default().to_string())
        .collect()
}
