//! Messages API relay
//!
//! Dispatches prepared requests to the upstream and hands the result back
//! either as a structured [`ApiResponse`] (buffered) or by streaming the
//! body straight into the caller's [`ResponseWriter`].

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request},
};
use tracing::{debug, Instrument};

use super::headers::{copy_passthrough_headers, normalize_csv};
use super::logging::RequestContext;
use super::writer::ResponseWriter;
use crate::config::{normalize_base_url, Config};
use crate::error::{RelayError, RelayResult};
use crate::response::{ApiResponse, APPLICATION_JSON};
use crate::routes::metrics::{record_relay_error, record_streamed_bytes};
use crate::streaming::{copy_stream, CopyEnd};

/// Path of the Messages API, both inbound and upstream
pub const MESSAGES_PATH: &str = "/v1/messages";

/// What the relay did with a request
#[derive(Debug)]
pub enum RelayOutcome {
    /// The response was written to the caller through the writer
    Handled { bytes_written: u64 },
    /// The caller still has to write this response
    Pending(ApiResponse),
}

/// Relay for the Messages API.
///
/// Holds the configured defaults and the shared HTTP client. Built once at
/// startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct MessagesRelay {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) default_api_key: String,
    pub(crate) default_version: String,
    pub(crate) default_beta: Vec<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) max_body_bytes: usize,
}

impl MessagesRelay {
    /// Create a relay from configuration, normalizing the defaults
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        let user_agent = config.user_agent.trim();
        Self {
            client,
            base_url: normalize_base_url(&config.anthropic_base_url),
            default_api_key: config.anthropic_api_key.trim().to_string(),
            default_version: config.anthropic_version.trim().to_string(),
            default_beta: normalize_csv([config.anthropic_beta.as_str()]),
            user_agent: (!user_agent.is_empty()).then(|| user_agent.to_string()),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full upstream URL for the Messages API
    pub fn messages_url(&self) -> String {
        format!("{}{}", self.base_url, MESSAGES_PATH)
    }

    /// Relay one inbound request.
    ///
    /// Errors detected before a stream begins come back as a `Pending` JSON
    /// error envelope. Once a stream has begun the outcome is always
    /// `Handled`.
    pub async fn handle<W: ResponseWriter>(
        &self,
        request: Request<Body>,
        writer: &mut W,
    ) -> RelayOutcome {
        let mut ctx = RequestContext::new(MESSAGES_PATH);
        let span = ctx.create_span();

        let result = self.relay(request, writer, &mut ctx).instrument(span).await;
        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                ctx.log_request_error(&err);
                record_relay_error(err.kind());
                RelayOutcome::Pending(err.to_api_response())
            }
        }
    }

    async fn relay<W: ResponseWriter>(
        &self,
        request: Request<Body>,
        writer: &mut W,
        ctx: &mut RequestContext,
    ) -> RelayResult<RelayOutcome> {
        let (parts, body) = request.into_parts();
        let body = self.read_body(body).await?;
        let body_size = body.len();

        let prepared = self.prepare(parts.method, &parts.headers, body)?;
        ctx.streaming = prepared.streaming;
        ctx.log_request_start(prepared.beta_count);
        ctx.log_upstream_request(prepared.request.url().as_str(), body_size);

        let response = self.dispatch(prepared.request, writer).await?;
        ctx.log_upstream_response(response.status().as_u16(), response.content_length());

        copy_passthrough_headers(writer.headers_mut(), response.headers());

        if prepared.streaming {
            return Ok(self.relay_stream(response, writer, ctx).await);
        }

        let api_response = self.relay_buffered(response, writer).await?;
        if let Ok(bytes) = api_response.body_bytes() {
            ctx.log_request_complete(api_response.status.as_u16(), bytes.len());
        }
        Ok(RelayOutcome::Pending(api_response))
    }

    /// Send the request, giving up as soon as the caller goes away
    async fn dispatch<W: ResponseWriter>(
        &self,
        request: reqwest::Request,
        writer: &W,
    ) -> RelayResult<reqwest::Response> {
        tokio::select! {
            result = self.client.execute(request) => {
                result.map_err(RelayError::UpstreamUnreachable)
            }
            _ = writer.closed() => Err(RelayError::ClientDisconnected),
        }
    }

    /// Read the whole upstream body into a structured response
    async fn relay_buffered<W: ResponseWriter>(
        &self,
        response: reqwest::Response,
        writer: &W,
    ) -> RelayResult<ApiResponse> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(APPLICATION_JSON)
            .to_string();

        let body = tokio::select! {
            body = response.bytes() => body.map_err(RelayError::UpstreamBody)?,
            _ = writer.closed() => return Err(RelayError::ClientDisconnected),
        };

        Ok(ApiResponse::raw(status, body).with_content_type(content_type))
    }

    /// Commit the upstream status and stream the body to the caller
    async fn relay_stream<W: ResponseWriter>(
        &self,
        response: reqwest::Response,
        writer: &mut W,
        ctx: &RequestContext,
    ) -> RelayOutcome {
        let status = response.status();
        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            if !content_type.is_empty() {
                writer.headers_mut().insert(CONTENT_TYPE, content_type.clone());
            }
        }

        if let Err(e) = writer.write_head(status).await {
            debug!(trace_id = %ctx.trace_id, error = %e, "Client gone before response head");
            return RelayOutcome::Handled { bytes_written: 0 };
        }
        ctx.log_stream_started(status.as_u16());

        let report = copy_stream(Box::pin(response.bytes_stream()), writer).await;
        ctx.log_stream_ended(&report);
        record_streamed_bytes(report.bytes);
        if report.end == CopyEnd::UpstreamError {
            record_relay_error("upstream_stream");
        }

        RelayOutcome::Handled {
            bytes_written: report.bytes,
        }
    }
}
