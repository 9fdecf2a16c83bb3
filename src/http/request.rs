//! Inbound request as seen by the dispatcher chain.
//!
//! # Responsibilities
//! - Carry the buffered request and its matched route between handlers
//! - Decide whether the client asked to keep the connection open
//!
//! # Design Decisions
//! - The body is buffered once so retries can replay it
//! - Keep-alive is computed up front; handlers never parse `Connection`

use std::sync::Arc;

use axum::http::{header, request::Parts, HeaderMap, Method, Uri, Version};
use bytes::Bytes;

use crate::routing::Router;

/// A buffered inbound request bound to its route.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub keep_alive: bool,
    pub router: Arc<Router>,
}

impl InboundRequest {
    pub fn new(parts: Parts, body: Bytes, router: Arc<Router>) -> Self {
        let keep_alive = is_keep_alive(parts.version, &parts.headers);
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            keep_alive,
            router,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query string, as received.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }
}

/// Whether the connection should stay open after the response.
///
/// HTTP/1.1 is persistent unless `close` is sent; HTTP/1.0 only with an
/// explicit `keep-alive`. HTTP/2 and later manage connections themselves.
pub fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let mut close = false;
    let mut keep_alive = false;

    for token in headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
    {
        if token.eq_ignore_ascii_case("close") {
            close = true;
        } else if token.eq_ignore_ascii_case("keep-alive") {
            keep_alive = true;
        }
    }

    match version {
        Version::HTTP_09 => false,
        Version::HTTP_10 => keep_alive && !close,
        Version::HTTP_11 => !close,
        _ => true,
    }
}
