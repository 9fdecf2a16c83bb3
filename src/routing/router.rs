//! The route entity: one compiled, immutable route.
//!
//! # Responsibilities
//! - Hold everything a dispatcher needs to serve a matched request
//! - Decide whether a path falls under the route prefix
//! - Trim the prefix into the upstream path / cache key
//!
//! # Design Decisions
//! - Header policy is compiled to typed names/values at load time
//! - The fallback is resolved from the registry once, never per request
//! - A default pass-through route stands in for "no match"

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};

use crate::config::{ConfigError, ResourceType, RouteConfig};
use crate::fallback::{FallbackProvider, FallbackRegistry};

/// Admission key of the default pass-through route.
pub const DEFAULT_ROUTE_KEY: &str = "<default>";

/// A compiled route.
#[derive(Debug)]
pub struct Router {
    prefix: String,
    provider: String,
    resource_type: ResourceType,
    url: String,
    cached: bool,
    timeout: Duration,
    retries: u32,
    allowed_permits: i64,
    fallback: Option<Arc<dyn FallbackProvider>>,
    default_headers: Vec<(HeaderName, HeaderValue)>,
    ignored_headers: HashSet<HeaderName>,
    charset: String,
    default_route: bool,
}

impl Router {
    /// Compile a route, resolving its fallback against `fallbacks`.
    pub fn from_config(config: &RouteConfig, fallbacks: &FallbackRegistry) -> Result<Self, ConfigError> {
        let fallback = match &config.fallback {
            Some(name) => Some(fallbacks.resolve(name).ok_or_else(|| ConfigError::UnknownFallback {
                route: config.prefix.clone(),
                name: name.clone(),
            })?),
            None => None,
        };

        let mut default_headers = Vec::with_capacity(config.default_headers.len());
        for pair in &config.default_headers {
            default_headers.push((parse_name(&pair.name)?, parse_value(&pair.name, &pair.value)?));
        }

        let mut ignored_headers = HashSet::with_capacity(config.ignored_headers.len());
        for name in &config.ignored_headers {
            ignored_headers.insert(parse_name(name)?);
        }

        Ok(Self {
            prefix: config.prefix.clone(),
            provider: config.provider.clone(),
            resource_type: config.resource_type,
            url: config.url.clone(),
            cached: config.cached,
            timeout: Duration::from_millis(config.timeout_ms),
            retries: config.retries,
            allowed_permits: config.allowed_permits,
            fallback,
            default_headers,
            ignored_headers,
            charset: config.charset.clone(),
            default_route: false,
        })
    }

    /// The route returned when nothing else matches.
    ///
    /// It leaves paths untouched and is never proxied; the dispatcher chain
    /// answers it with 404.
    pub fn pass_through() -> Self {
        let defaults = RouteConfig::default();
        Self {
            prefix: "/".to_string(),
            provider: String::new(),
            resource_type: ResourceType::Proxy,
            url: String::new(),
            cached: false,
            timeout: Duration::from_millis(defaults.timeout_ms),
            retries: 0,
            allowed_permits: 0,
            fallback: None,
            default_headers: Vec::new(),
            ignored_headers: HashSet::new(),
            charset: defaults.charset,
            default_route: true,
        }
    }

    /// Whether `path` (query string ignored) falls under this route.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.starts_with(&self.prefix)
    }

    /// Strip the prefix from `path`. The result always starts with `/`.
    pub fn trim_path(&self, path: &str) -> String {
        if self.default_route {
            return path.to_string();
        }
        let rest = path.strip_prefix(self.prefix.as_str()).unwrap_or(path);
        if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        }
    }

    pub fn is_default(&self) -> bool {
        self.default_route
    }

    /// Key shared by every request on this route in the admission table.
    pub fn key(&self) -> &str {
        if self.default_route {
            DEFAULT_ROUTE_KEY
        } else {
            &self.prefix
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cached(&self) -> bool {
        self.cached
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn allowed_permits(&self) -> i64 {
        self.allowed_permits
    }

    pub fn fallback(&self) -> Option<&Arc<dyn FallbackProvider>> {
        self.fallback.as_ref()
    }

    pub fn default_headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.default_headers
    }

    pub fn ignored_headers(&self) -> &HashSet<HeaderName> {
        &self.ignored_headers
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }
}

fn parse_name(name: &str) -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
