//! Header utilities for Messages API relaying
//!
//! Resolves credential and version headers against configured defaults,
//! normalizes comma-separated beta flags, and copies the small allow-list of
//! upstream response headers back to the caller.

use axum::http::header::{HeaderMap, HeaderName};

/// Credential header
pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
/// Protocol version header
pub const ANTHROPIC_VERSION: HeaderName = HeaderName::from_static("anthropic-version");
/// Feature flag header, repeatable and comma-separated
pub const ANTHROPIC_BETA: HeaderName = HeaderName::from_static("anthropic-beta");
pub const REQUEST_ID: HeaderName = HeaderName::from_static("request-id");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Response headers copied from upstream to the caller, in order.
/// Nothing else is ever passed through.
pub static PASSTHROUGH_RESPONSE_HEADERS: [HeaderName; 5] = [
    ANTHROPIC_VERSION,
    ANTHROPIC_BETA,
    REQUEST_ID,
    X_REQUEST_ID,
    axum::http::header::RETRY_AFTER,
];

/// First value of `name`, trimmed, if it is a non-empty string
pub fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Header value when present and non-empty after trimming, otherwise the
/// trimmed fallback. An empty string means neither was supplied.
pub fn header_or_default(headers: &HeaderMap, name: &HeaderName, fallback: &str) -> String {
    header_str(headers, name)
        .unwrap_or_else(|| fallback.trim())
        .to_string()
}

/// Split every value on commas, trim each piece and drop empty pieces.
///
/// Order of first occurrence is preserved and repeated values are kept.
pub fn normalize_csv<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// All values of `name` that are valid strings
pub fn header_values<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
) -> impl Iterator<Item = &'a str> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
}

/// Copy allow-listed headers from `src` onto `dst`.
///
/// Any existing value of an allow-listed header on `dst` is removed first, so
/// repeated calls never accumulate values. Empty upstream values are skipped;
/// other values are copied verbatim, one occurrence per upstream occurrence.
pub fn copy_passthrough_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for name in PASSTHROUGH_RESPONSE_HEADERS.iter() {
        dst.remove(name);
        for value in src.get_all(name) {
            if !value.is_empty() {
                dst.append(name.clone(), value.clone());
            }
        }
    }
}
