//! Outbound request preparation
//!
//! Turns an inbound Messages API request into the upstream request: resolves
//! credentials and version against configured defaults, normalizes beta
//! flags, and decides between buffered and streaming relay.

use axum::{
    body::Body,
    http::{
        header::{AsHeaderName, HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT},
        Method,
    },
};
use bytes::Bytes;
use serde::de::{Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use std::borrow::Cow;
use std::fmt;

use super::headers::{
    header_or_default, header_values, normalize_csv, ANTHROPIC_BETA, ANTHROPIC_VERSION, X_API_KEY,
};
use super::relay::MessagesRelay;
use crate::error::{RelayError, RelayResult};
use crate::response::APPLICATION_JSON;

/// Accept value requested upstream for streams when the caller sent none
pub const EVENT_STREAM: &str = "text/event-stream";

/// Upstream request ready to dispatch
#[derive(Debug)]
pub struct PreparedRequest {
    pub request: reqwest::Request,
    pub streaming: bool,
    /// Number of beta flags sent upstream
    pub beta_count: usize,
}

/// `stream` field of a request body. Only a JSON object is accepted; when the
/// key repeats, the last occurrence wins.
struct StreamFlag {
    stream: Option<bool>,
}

impl<'de> Deserialize<'de> for StreamFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StreamFlagVisitor;

        impl<'de> Visitor<'de> for StreamFlagVisitor {
            type Value = StreamFlag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<StreamFlag, A::Error> {
                let mut stream = None;
                while let Some(key) = map.next_key::<Cow<'de, str>>()? {
                    if key == "stream" {
                        stream = map.next_value::<Option<bool>>()?;
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(StreamFlag { stream })
            }
        }

        deserializer.deserialize_map(StreamFlagVisitor)
    }
}

/// Whether the body asks for a streamed response.
///
/// Only an explicit `"stream": true` on a JSON object counts; an empty or
/// malformed body, a non-object, a missing field and a non-boolean value all
/// mean buffered.
pub fn is_streaming_request(body: &[u8]) -> bool {
    if body.is_empty() {
        return false;
    }
    serde_json::from_slice::<StreamFlag>(body)
        .ok()
        .and_then(|flag| flag.stream)
        .unwrap_or(false)
}

fn header_value(name: &str, value: &str) -> RelayResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| RelayError::BuildRequest(format!("invalid {} value: {}", name, e)))
}

/// First non-empty value of a header, as-is
fn non_empty(headers: &HeaderMap, name: impl AsHeaderName) -> Option<HeaderValue> {
    headers.get(name).filter(|v| !v.is_empty()).cloned()
}

impl MessagesRelay {
    /// Read the whole inbound body, bounded by the configured limit
    pub async fn read_body(&self, body: Body) -> RelayResult<Bytes> {
        axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(RelayError::ReadBody)
    }

    /// Build the upstream request for an already-read inbound body
    pub fn prepare(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> RelayResult<PreparedRequest> {
        let streaming = is_streaming_request(&body);

        let api_key = header_or_default(headers, &X_API_KEY, &self.default_api_key);
        if api_key.is_empty() {
            return Err(RelayError::MissingApiKey);
        }

        let version = header_or_default(headers, &ANTHROPIC_VERSION, &self.default_version);
        if version.is_empty() {
            return Err(RelayError::MissingVersion);
        }

        let mut outbound = HeaderMap::new();
        outbound.insert(X_API_KEY, header_value("X-Api-Key", &api_key)?);
        outbound.insert(ANTHROPIC_VERSION, header_value("Anthropic-Version", &version)?);

        let inbound_betas = normalize_csv(header_values(headers, &ANTHROPIC_BETA));
        let betas = if inbound_betas.is_empty() {
            &self.default_beta
        } else {
            &inbound_betas
        };
        for beta in betas {
            outbound.append(ANTHROPIC_BETA, header_value("Anthropic-Beta", beta)?);
        }

        let content_type = non_empty(headers, CONTENT_TYPE)
            .unwrap_or_else(|| HeaderValue::from_static(APPLICATION_JSON));
        outbound.insert(CONTENT_TYPE, content_type);

        if streaming {
            let accept = non_empty(headers, ACCEPT)
                .unwrap_or_else(|| HeaderValue::from_static(EVENT_STREAM));
            outbound.insert(ACCEPT, accept);
        }

        if let Some(user_agent) = &self.user_agent {
            outbound.insert(USER_AGENT, header_value("User-Agent", user_agent)?);
        }

        let request = self
            .client
            .request(method, self.messages_url())
            .headers(outbound)
            .body(body)
            .build()
            .map_err(|e| RelayError::BuildRequest(e.to_string()))?;

        Ok(PreparedRequest {
            request,
            streaming,
            beta_count: betas.len(),
        })
    }
}
