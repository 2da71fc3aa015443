//! Anthropic Relay - single-endpoint relay for the Anthropic Messages API
//!
//! Accepts `POST /v1/messages`, forwards the request body unmodified to the
//! configured upstream with resolved credential, version and beta headers,
//! and relays the response back: buffered as a whole, or streamed chunk by
//! chunk when the request asks for `"stream": true`.

pub mod config;
pub mod error;
pub mod proxy;
pub mod response;
pub mod routes;
pub mod streaming;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

pub use crate::config::Config;
pub use crate::error::{RelayError, RelayResult};
pub use crate::proxy::{MessagesRelay, RelayOutcome};
pub use crate::response::ApiResponse;

/// Application state shared across all request handlers
pub struct AppState {
    pub start_time: Instant,
    /// Relay for the Messages API, sharing one connection pool
    pub relay: Arc<MessagesRelay>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: &Config) -> Result<Self> {
        // Initialize HTTP client with connection pooling. No overall timeout:
        // streams may legitimately run for minutes.
        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(100);
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build()?;

        Ok(Self::with_client(config, http_client))
    }

    /// Create application state around an existing HTTP client
    pub fn with_client(config: &Config, http_client: reqwest::Client) -> Self {
        let relay = Arc::new(MessagesRelay::new(http_client, config));

        Self {
            start_time: Instant::now(),
            relay,
        }
    }
}
