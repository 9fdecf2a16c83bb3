//! Proxied routes: cache lookup, backend execution, buffered response.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::cache::ResponseCache;
use crate::dispatch::{Dispatch, RequestHandler};
use crate::error::GatewayError;
use crate::http::response;
use crate::http::InboundRequest;
use crate::observability::metrics;
use crate::upstream::{RequestBuilder, RequestExecutor, ResponseSource};

/// Forwards requests to the route provider, with optional caching.
pub struct DynamicDispatcher {
    executor: Arc<RequestExecutor>,
    cache: Arc<dyn ResponseCache>,
}

impl DynamicDispatcher {
    pub fn new(executor: Arc<RequestExecutor>, cache: Arc<dyn ResponseCache>) -> Self {
        Self { executor, cache }
    }
}

#[async_trait]
impl RequestHandler for DynamicDispatcher {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    async fn handle(&self, request: InboundRequest) -> Result<Dispatch, GatewayError> {
        let router = Arc::clone(&request.router);
        if router.is_default() {
            return Ok(Dispatch::Pass(request));
        }

        let raw_path = router.trim_path(request.path_and_query());
        let forwarded = RequestBuilder::build(&request, raw_path.as_str());

        if router.cached() {
            let hit = self.cache.get(&raw_path).filter(|body| !body.trim().is_empty());
            metrics::record_cache_lookup(router.key(), hit.is_some());
            if let Some(body) = hit {
                tracing::debug!(route = %router.key(), key = %raw_path, "Cache hit");
                return Ok(Dispatch::Handled(response::buffered(StatusCode::OK, None, body)));
            }
        }

        let outcome = self
            .executor
            .send(router.provider(), &forwarded, router.charset())
            .await?;

        if router.cached() && outcome.source == ResponseSource::Backend && outcome.response.is_success() {
            self.cache.put(&raw_path, outcome.response.body.clone());
        }

        let upstream = outcome.response;
        let content_type = upstream.content_type().map(str::to_owned);
        Ok(Dispatch::Handled(response::buffered(
            upstream.status,
            content_type.as_deref(),
            upstream.body,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::RouteConfig;
    use crate::fallback::{FallbackRegistry, StaticFallback};
    use crate::resilience::{AdmissionControl, BackoffPolicy};
    use crate::routing::Router;
    use crate::upstream::transport::testing::{fail_then_ok, MockTransport};
    use axum::http::{header, HeaderValue, Request};
    use axum::response::Response;
    use bytes::Bytes;

    struct Fixture {
        transport: Arc<MockTransport>,
        cache: Arc<MemoryCache>,
        dispatcher: DynamicDispatcher,
    }

    fn fixture(transport: MockTransport) -> Fixture {
        let transport = Arc::new(transport);
        let cache = Arc::new(MemoryCache::new());
        let executor = RequestExecutor::new(transport.clone(), AdmissionControl::new(), BackoffPolicy::immediate());
        let dispatcher = DynamicDispatcher::new(Arc::new(executor), cache.clone());
        Fixture {
            transport,
            cache,
            dispatcher,
        }
    }

    fn inbound(router: Router, uri: &str) -> InboundRequest {
        let (parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        InboundRequest::new(parts, Bytes::new(), Arc::new(router))
    }

    fn api_route(cached: bool, retries: u32) -> Router {
        let config = RouteConfig {
            prefix: "/api/".into(),
            provider: "http://svc".into(),
            cached,
            retries,
            ..Default::default()
        };
        Router::from_config(&config, &FallbackRegistry::new()).unwrap()
    }

    async fn handled(dispatch: Dispatch) -> (Response, String) {
        let Dispatch::Handled(response) = dispatch else {
            panic!("expected a response");
        };
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        (
            Response::from_parts(parts, axum::body::Body::empty()),
            String::from_utf8(body.to_vec()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_default_route_passes() {
        let f = fixture(MockTransport::ok("x"));
        let result = f
            .dispatcher
            .handle(inbound(Router::pass_through(), "/nowhere"))
            .await
            .unwrap();
        assert!(matches!(result, Dispatch::Pass(_)));
        assert_eq!(f.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_retry_scenario() {
        let f = fixture(MockTransport::new(fail_then_ok(2, StatusCode::SERVICE_UNAVAILABLE, "{\"id\":1}")));

        let first = f.dispatcher.handle(inbound(api_route(true, 2), "/api/items/1")).await.unwrap();
        let (response, body) = handled(first).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body, "{\"id\":1}");
        assert_eq!(f.transport.calls(), 3);
        assert_eq!(f.transport.seen()[0].0, "http://svc/items/1");

        let second = f.dispatcher.handle(inbound(api_route(true, 2), "/api/items/1")).await.unwrap();
        let (response, body) = handled(second).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body, "{\"id\":1}");
        assert_eq!(f.transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_blank_cache_entry_is_a_miss() {
        let f = fixture(MockTransport::ok("fresh"));
        f.cache.put("/items", "   ".into());

        let result = f.dispatcher.handle(inbound(api_route(true, 0), "/api/items")).await.unwrap();
        let (_, body) = handled(result).await;
        assert_eq!(body, "fresh");
        assert_eq!(f.transport.calls(), 1);
        assert_eq!(f.cache.get("/items").as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_uncached_route_always_calls_backend() {
        let f = fixture(MockTransport::ok("live"));
        for _ in 0..3 {
            f.dispatcher.handle(inbound(api_route(false, 0), "/api/items")).await.unwrap();
        }
        assert_eq!(f.transport.calls(), 3);
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn test_backend_content_type_relayed() {
        let f = fixture(MockTransport::new(|_, _| {
            Ok(crate::upstream::UpstreamResponse::new(StatusCode::OK, "<p>hi</p>")
                .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html")))
        }));

        let result = f.dispatcher.handle(inbound(api_route(false, 0), "/api/page")).await.unwrap();
        let (response, _) = handled(result).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "9");
    }

    #[tokio::test]
    async fn test_decoded_body_labelled_utf8() {
        let f = fixture(MockTransport::new(|_, _| {
            Ok(crate::upstream::UpstreamResponse::new(StatusCode::OK, "café").with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=ISO-8859-1"),
            ))
        }));

        let result = f.dispatcher.handle(inbound(api_route(false, 0), "/api/menu")).await.unwrap();
        let (response, body) = handled(result).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
        assert_eq!(body, "café");
    }

    #[tokio::test]
    async fn test_fallback_is_not_cached() {
        let f = fixture(MockTransport::new(fail_then_ok(u32::MAX, StatusCode::BAD_GATEWAY, "")));
        let mut registry = FallbackRegistry::new();
        registry.register(
            "empty",
            Arc::new(StaticFallback::new(
                StatusCode::OK,
                HeaderValue::from_static("application/json"),
                "[]",
            )),
        );
        let config = RouteConfig {
            prefix: "/api/".into(),
            provider: "http://svc".into(),
            cached: true,
            retries: 1,
            fallback: Some("empty".into()),
            ..Default::default()
        };
        let router = Router::from_config(&config, &registry).unwrap();

        let result = f.dispatcher.handle(inbound(router, "/api/items")).await.unwrap();
        let (response, body) = handled(result).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body, "[]");
        assert_eq!(f.transport.calls(), 2);
        assert!(f.cache.get("/items").is_none());
    }

    #[tokio::test]
    async fn test_exhaustion_without_fallback_is_an_error() {
        let f = fixture(MockTransport::new(fail_then_ok(u32::MAX, StatusCode::SERVICE_UNAVAILABLE, "")));
        let result = f.dispatcher.handle(inbound(api_route(true, 1), "/api/items")).await;
        assert!(matches!(result, Err(GatewayError::BackendUnavailable { .. })));
        assert_eq!(f.transport.calls(), 2);
    }
}
