//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Backoff applied between backend retries.
    pub retries: RetryConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Named fallback responses routes can refer to.
    pub fallbacks: Vec<FallbackConfig>,

    /// Route definitions, matched by longest prefix.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest inbound body buffered before dispatch.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Outer deadline for a whole inbound request, including file transfers.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Retry backoff configuration. The retry count itself is per route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry, doubled for each further one.
    pub base_delay_ms: u64,

    /// Upper bound on the delay between two attempts.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

/// In-memory response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries; the oldest entry is evicted beyond it.
    pub max_entries: Option<usize>,

    /// Entry lifetime in seconds. Entries never expire when unset.
    pub ttl_secs: Option<u64>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when RUST_LOG is unset.
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Address the Prometheus exporter listens on.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A static fallback response registered under `name`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Registry key routes refer to.
    pub name: String,

    /// Status code of the fallback response.
    #[serde(default = "default_fallback_status")]
    pub status: u16,

    /// Content type. Derived from the body when unset.
    #[serde(default)]
    pub content_type: Option<String>,

    /// Response body. Strings are sent verbatim, other values as JSON.
    #[serde(default)]
    pub body: serde_json::Value,
}

fn default_fallback_status() -> u16 {
    200
}

/// How a route's requests are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Forward to `provider` + trimmed path, buffered.
    #[default]
    Proxy,
    /// Answer with a redirect to `url`.
    Redirect,
    /// Download `url` and stream it back inline.
    Stream,
    /// Download `url` and stream it back as an attachment.
    File,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Proxy => "proxy",
            ResourceType::Redirect => "redirect",
            ResourceType::Stream => "stream",
            ResourceType::File => "file",
        };
        f.write_str(name)
    }
}

/// A header name/value pair, kept ordered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

impl HeaderPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Route configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Path prefix to match. Also the route's admission key.
    pub prefix: String,

    /// Backend base URL (e.g., "http://127.0.0.1:3000").
    pub provider: String,

    /// How the route is served.
    pub resource_type: ResourceType,

    /// Target for redirect, stream and file routes.
    pub url: String,

    /// Cache successful proxy responses by trimmed path.
    pub cached: bool,

    /// Deadline for admission and for each backend attempt.
    pub timeout_ms: u64,

    /// Extra attempts after the first one.
    pub retries: u32,

    /// Concurrent backend calls allowed. Zero or negative means unbounded.
    pub allowed_permits: i64,

    /// Name of a registered fallback.
    pub fallback: Option<String>,

    /// Headers added to every forwarded request, replacing inbound values.
    pub default_headers: Vec<HeaderPair>,

    /// Headers removed from every forwarded request.
    pub ignored_headers: Vec<String>,

    /// Charset used to decode buffered backend bodies.
    pub charset: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            provider: String::new(),
            resource_type: ResourceType::Proxy,
            url: String::new(),
            cached: false,
            timeout_ms: 30_000,
            retries: 0,
            allowed_permits: 0,
            fallback: None,
            default_headers: Vec::new(),
            ignored_headers: Vec::new(),
            charset: "utf-8".to_string(),
        }
    }
}
