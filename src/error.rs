//! Error types for the relay
//!
//! Every failure the relay detects before a stream has begun is turned into a
//! JSON error envelope with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Status recorded when the caller goes away before a response exists
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Relay-level errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to read request body")]
    ReadBody(#[source] axum::Error),

    #[error("missing Anthropic API key; set X-Api-Key header or ANTHROPIC_API_KEY")]
    MissingApiKey,

    #[error("missing Anthropic API version; set Anthropic-Version header or ANTHROPIC_VERSION")]
    MissingVersion,

    #[error("failed to construct upstream request")]
    BuildRequest(String),

    #[error("failed to reach Anthropic Messages API")]
    UpstreamUnreachable(#[source] reqwest::Error),

    #[error("failed to read response from Anthropic Messages API")]
    UpstreamBody(#[source] reqwest::Error),

    #[error("client closed request")]
    ClientDisconnected,
}

impl RelayError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::ReadBody(_) | RelayError::MissingApiKey | RelayError::MissingVersion => {
                StatusCode::BAD_REQUEST
            }
            RelayError::BuildRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::UpstreamUnreachable(_) | RelayError::UpstreamBody(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::ClientDisconnected => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::BAD_REQUEST),
        }
    }

    /// Short label used in metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::ReadBody(_) => "read_body",
            RelayError::MissingApiKey => "missing_api_key",
            RelayError::MissingVersion => "missing_version",
            RelayError::BuildRequest(_) => "build_request",
            RelayError::UpstreamUnreachable(_) => "upstream_unreachable",
            RelayError::UpstreamBody(_) => "upstream_body",
            RelayError::ClientDisconnected => "client_disconnected",
        }
    }

    /// JSON error envelope carrying this error's message
    pub fn to_api_response(&self) -> ApiResponse {
        ApiResponse::error(self.status(), &self.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.to_api_response().into_response()
    }
}

/// Result type alias for convenience
pub type RelayResult<T> = Result<T, RelayError>;
