//! Request dispatch pipeline.
//!
//! # Data Flow
//! ```text
//! InboundRequest (route already matched)
//!     → static_dispatcher.rs (redirect / stream / file routes)
//!     → dynamic_dispatcher.rs (proxied routes, cache, executor)
//!     → terminal: 404 for requests only the default route matched
//! ```
//!
//! # Design Decisions
//! - Each handler either answers or passes the request on unchanged
//! - The route is matched once, before the first handler
//! - Errors become responses here; nothing propagates past the chain
//! - Keep-alive is mirrored on every response, errors included

pub mod dynamic_dispatcher;
pub mod static_dispatcher;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::error::GatewayError;
use crate::http::response::mirror_keep_alive;
use crate::http::InboundRequest;
use crate::observability::metrics;
use crate::routing::RouterManager;

pub use dynamic_dispatcher::DynamicDispatcher;
pub use static_dispatcher::{resolve_file_name, StaticDispatcher};

/// What a handler did with a request.
pub enum Dispatch {
    /// The response is final.
    Handled(Response),
    /// Not for this handler; hand it to the next one.
    Pass(InboundRequest),
}

/// One stage of the dispatcher chain.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: InboundRequest) -> Result<Dispatch, GatewayError>;
}

/// Ordered handlers ending in a not-found step.
pub struct DispatchChain {
    routers: Arc<RouterManager>,
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl DispatchChain {
    pub fn new(routers: Arc<RouterManager>, handlers: Vec<Arc<dyn RequestHandler>>) -> Self {
        Self { routers, handlers }
    }

    pub fn routers(&self) -> &RouterManager {
        &self.routers
    }

    /// Match, run the handlers and frame the result.
    pub async fn dispatch(&self, parts: Parts, body: Bytes) -> Response {
        let start = Instant::now();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path())
            .to_string();
        let router = self.routers.match_path(&path);
        let route = router.key().to_string();

        let mut request = InboundRequest::new(parts, body, router);
        let version = request.version;
        let keep_alive = request.keep_alive;

        let mut response = 'chain: {
            for handler in &self.handlers {
                match handler.handle(request).await {
                    Ok(Dispatch::Handled(response)) => {
                        tracing::debug!(route = %route, handler = handler.name(), "Request handled");
                        break 'chain response;
                    }
                    Ok(Dispatch::Pass(next)) => request = next,
                    Err(error) => break 'chain Self::error_response(&route, &path, error),
                }
            }
            Self::error_response(&route, &path, GatewayError::RouteNotResolved { path: path.clone() })
        };

        mirror_keep_alive(&mut response, version, keep_alive);
        metrics::record_request(&route, response.status().as_u16(), start);
        response
    }

    /// Frame an error raised before dispatch (e.g. an oversized body).
    pub fn reject(&self, parts: &Parts, error: GatewayError) -> Response {
        let path = parts.uri.path().to_string();
        let route = self.routers.match_path(&path).key().to_string();
        let mut response = Self::error_response(&route, &path, error);
        let keep_alive = crate::http::request::is_keep_alive(parts.version, &parts.headers);
        mirror_keep_alive(&mut response, parts.version, keep_alive);
        metrics::record_request(&route, response.status().as_u16(), Instant::now());
        response
    }

    fn error_response(route: &str, path: &str, error: GatewayError) -> Response {
        if error.status().is_server_error() {
            tracing::warn!(route = %route, path = %path, kind = error.kind(), error = %error, "Dispatch failed");
        } else {
            tracing::debug!(route = %route, path = %path, kind = error.kind(), error = %error, "Dispatch rejected");
        }
        error.into_response()
    }
}
