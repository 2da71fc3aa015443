//! Structured response envelope
//!
//! A plain holder for a status code, a body payload and a content type. The
//! relay returns one of these whenever it has not written the response itself.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;
use tracing::error;

/// Default media type for envelopes and buffered passthrough bodies
pub const APPLICATION_JSON: &str = "application/json";

/// Body payload of an [`ApiResponse`]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    /// Bytes written verbatim (upstream passthrough)
    Raw(Bytes),
    /// Value serialized as JSON on write
    Json(serde_json::Value),
}

/// Error envelope body: `{"error": "<message>"}`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub error: &'a str,
}

/// Status code, body and content type for a response not yet written
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    body: ApiBody,
    content_type: Option<String>,
}

impl ApiResponse {
    /// Create a response with the given status and body
    pub fn new(status: StatusCode, body: ApiBody) -> Self {
        Self {
            status,
            body,
            content_type: None,
        }
    }

    /// Raw passthrough body
    pub fn raw(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, ApiBody::Raw(body.into()))
    }

    /// JSON error envelope with an `application/json` content type
    pub fn error(status: StatusCode, message: &str) -> Self {
        let value = serde_json::to_value(ErrorEnvelope { error: message })
            .unwrap_or_else(|_| serde_json::Value::Null);
        Self::new(status, ApiBody::Json(value)).with_content_type(APPLICATION_JSON)
    }

    /// Set the content type, chaining
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn set_body(&mut self, body: ApiBody) -> &mut Self {
        self.body = body;
        self
    }

    pub fn body(&self) -> &ApiBody {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Serialized body bytes
    pub fn body_bytes(&self) -> Result<Bytes, serde_json::Error> {
        match &self.body {
            ApiBody::Raw(bytes) => Ok(bytes.clone()),
            ApiBody::Json(value) => serde_json::to_vec(value).map(Bytes::from),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let bytes = match self.body_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = self.status;

        if let Some(content_type) = self.content_type {
            match HeaderValue::from_str(&content_type) {
                Ok(value) => {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                Err(_) => {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
                }
            }
        }

        response
    }
}
