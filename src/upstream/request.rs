//! Forwarded request construction.
//!
//! # Responsibilities
//! - Apply the route's header policy to the inbound headers
//! - Carry the route's timeout, retry, admission and fallback settings
//! - Resolve the backend URL from provider and path
//!
//! # Design Decisions
//! - Header policy order: inbound, then defaults (replacing), then ignored
//! - An absolute target path bypasses the provider

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;

use crate::fallback::FallbackProvider;
use crate::http::InboundRequest;

/// A backend request built from an inbound request and its route.
#[derive(Clone)]
pub struct ForwardedRequest {
    /// Trimmed path for proxying, route url for downloads.
    pub path: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub retries: u32,
    pub allowed_permits: i64,
    pub fallback: Option<Arc<dyn FallbackProvider>>,
    /// Admission table key of the originating route.
    pub route_key: String,
}

impl fmt::Debug for ForwardedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardedRequest")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("headers", &self.headers.len())
            .field("body", &self.body.as_ref().map(Bytes::len))
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("allowed_permits", &self.allowed_permits)
            .field("fallback", &self.fallback.is_some())
            .field("route_key", &self.route_key)
            .finish()
    }
}

#[cfg(test)]
impl ForwardedRequest {
    pub(crate) fn for_test(path: &str) -> Self {
        Self {
            path: path.to_string(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            timeout: Duration::from_secs(1),
            retries: 0,
            allowed_permits: 0,
            fallback: None,
            route_key: "/test/".to_string(),
        }
    }
}

/// Builds `ForwardedRequest`s from inbound requests.
pub struct RequestBuilder;

impl RequestBuilder {
    /// Forward `inbound` to `path` under its route's policy.
    pub fn build(inbound: &InboundRequest, path: impl Into<String>) -> ForwardedRequest {
        let router = &inbound.router;
        let mut headers = inbound.headers.clone();

        let mut seen = Vec::with_capacity(router.default_headers().len());
        for (name, value) in router.default_headers() {
            // First default of a name replaces the inbound value, later ones add.
            if seen.contains(name) {
                headers.append(name.clone(), value.clone());
            } else {
                headers.insert(name.clone(), value.clone());
                seen.push(name.clone());
            }
        }

        for name in router.ignored_headers() {
            headers.remove(name);
        }

        let body = if inbound.body.is_empty() {
            None
        } else {
            Some(inbound.body.clone())
        };

        ForwardedRequest {
            path: path.into(),
            method: inbound.method.clone(),
            headers,
            body,
            timeout: router.timeout(),
            retries: router.retries(),
            allowed_permits: router.allowed_permits(),
            fallback: router.fallback().cloned(),
            route_key: router.key().to_string(),
        }
    }
}

/// Whether `target` is a full http(s) URL.
pub fn is_absolute(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Backend URL for `path` on `provider`.
pub fn resolve_target(provider: &str, path: &str) -> String {
    if is_absolute(path) {
        return path.to_string();
    }
    let base = provider.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
