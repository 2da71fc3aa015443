//! Request logging utilities for Messages API relaying
//!
//! Provides structured logging with correlation IDs so a single relayed
//! request can be followed from arrival to the last streamed byte.

use std::time::Instant;
use tracing::{debug, info, warn, Span};
use uuid::Uuid;

use crate::error::RelayError;
use crate::streaming::CopyReport;

/// Context for tracking a request through the relay
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request (for log correlation)
    pub trace_id: String,
    /// When the request started
    pub start_time: Instant,
    /// Endpoint being relayed
    pub endpoint: String,
    /// Whether this is a streaming request
    pub streaming: bool,
}

impl RequestContext {
    pub fn new(endpoint: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string()[..8].to_string(), // Short ID for readability
            start_time: Instant::now(),
            endpoint: endpoint.to_string(),
            streaming: false,
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    pub fn log_request_start(&self, beta_count: usize) {
        info!(
            trace_id = %self.trace_id,
            endpoint = %self.endpoint,
            streaming = %self.streaming,
            beta_count = %beta_count,
            "Request started"
        );
    }

    /// Log request being sent to upstream
    pub fn log_upstream_request(&self, url: &str, body_size: usize) {
        debug!(
            trace_id = %self.trace_id,
            url = %url,
            body_size = %body_size,
            elapsed_ms = %self.elapsed_ms(),
            "Sending request to upstream"
        );
    }

    /// Log response received from upstream
    pub fn log_upstream_response(&self, status: u16, content_length: Option<u64>) {
        info!(
            trace_id = %self.trace_id,
            endpoint = %self.endpoint,
            status = %status,
            content_length = ?content_length,
            elapsed_ms = %self.elapsed_ms(),
            "Response received from upstream"
        );
    }

    pub fn log_request_complete(&self, status: u16, body_size: usize) {
        info!(
            trace_id = %self.trace_id,
            endpoint = %self.endpoint,
            streaming = %self.streaming,
            status = %status,
            body_size = %body_size,
            elapsed_ms = %self.elapsed_ms(),
            "Request completed"
        );
    }

    pub fn log_stream_started(&self, status: u16) {
        info!(
            trace_id = %self.trace_id,
            endpoint = %self.endpoint,
            status = %status,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response started"
        );
    }

    pub fn log_stream_ended(&self, report: &CopyReport) {
        info!(
            trace_id = %self.trace_id,
            endpoint = %self.endpoint,
            bytes = %report.bytes,
            chunks = %report.chunks,
            end = ?report.end,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response ended"
        );
    }

    /// Log request failure. Client mistakes are warnings, the rest are errors.
    pub fn log_request_error(&self, error: &RelayError) {
        let status = error.status().as_u16();
        let source = std::error::Error::source(error).map(|e| e.to_string());
        if status < 500 {
            warn!(
                trace_id = %self.trace_id,
                endpoint = %self.endpoint,
                status = %status,
                error = %error,
                elapsed_ms = %self.elapsed_ms(),
                "Request rejected"
            );
        } else {
            tracing::error!(
                trace_id = %self.trace_id,
                endpoint = %self.endpoint,
                streaming = %self.streaming,
                status = %status,
                error = %error,
                cause = ?source,
                elapsed_ms = %self.elapsed_ms(),
                "Request failed"
            );
        }
    }

    /// Create a tracing span for this request
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "relay_request",
            trace_id = %self.trace_id,
            endpoint = %self.endpoint,
        )
    }
}
