//! Configuration management for the relay
//!
//! Configuration is loaded from environment variables once at startup and is
//! read-only afterwards.

use anyhow::{Context, Result};
use std::env;

/// Public Anthropic API endpoint used when `ANTHROPIC_BASE_URL` is not set
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default bound on inbound request bodies (32 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Upstream base URL, without trailing slash
    pub anthropic_base_url: String,
    /// Credential used when the caller sends no `X-Api-Key`
    pub anthropic_api_key: String,
    /// Protocol version used when the caller sends no `Anthropic-Version`
    pub anthropic_version: String,
    /// Raw comma-separated beta flags used when the caller sends none
    pub anthropic_beta: String,

    /// `User-Agent` sent upstream; empty disables the header
    pub user_agent: String,

    /// Largest inbound body accepted, in bytes
    pub max_body_bytes: usize,
    /// Optional upstream connect timeout (seconds)
    pub connect_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            anthropic_api_key: String::new(),
            anthropic_version: String::new(),
            anthropic_beta: String::new(),
            user_agent: default_user_agent(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            connect_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("RELAY_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid RELAY_PORT")?,

            anthropic_base_url: normalize_base_url(
                &env::var("ANTHROPIC_BASE_URL").unwrap_or_default(),
            ),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_version: env::var("ANTHROPIC_VERSION").unwrap_or_default(),
            anthropic_beta: env::var("ANTHROPIC_BETA").unwrap_or_default(),

            user_agent: env::var("RELAY_USER_AGENT").unwrap_or_else(|_| default_user_agent()),

            max_body_bytes: env::var("RELAY_MAX_BODY_BYTES")
                .unwrap_or_else(|_| DEFAULT_MAX_BODY_BYTES.to_string())
                .parse()
                .context("Invalid RELAY_MAX_BODY_BYTES")?,
            connect_timeout_secs: match env::var("RELAY_CONNECT_TIMEOUT_SECS") {
                Ok(v) if !v.trim().is_empty() => Some(
                    v.trim()
                        .parse()
                        .context("Invalid RELAY_CONNECT_TIMEOUT_SECS")?,
                ),
                _ => None,
            },
        })
    }
}

/// Identifying client string sent upstream by default
pub fn default_user_agent() -> String {
    format!("anthropic-relay/{}", env!("CARGO_PKG_VERSION"))
}

/// Strip one trailing slash; an empty value falls back to the public endpoint.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.strip_suffix('/').unwrap_or(raw);
    if trimmed.is_empty() {
        DEFAULT_ANTHROPIC_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}
