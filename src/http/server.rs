//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile the configuration into routes, fallbacks and bulkheads
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Buffer inbound bodies up to the configured limit
//! - Hand every request to the dispatch chain
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::{MemoryCache, ResponseCache};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::dispatch::{DispatchChain, DynamicDispatcher, RequestHandler, StaticDispatcher};
use crate::error::GatewayError;
use crate::fallback::{FallbackProvider, FallbackRegistry};
use crate::resilience::{AdmissionControl, AdmissionStats, BackoffPolicy};
use crate::routing::RouterManager;
use crate::upstream::{RequestExecutor, ReqwestTransport, Transport};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<DispatchChain>,
    pub max_body_bytes: usize,
}

/// HTTP server for the edge gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    admission: AdmissionControl,
    routes: Arc<RouterManager>,
}

/// Assembles an [`HttpServer`], allowing programmatic fallbacks, a custom
/// cache and a custom transport on top of the configuration.
pub struct HttpServerBuilder {
    config: GatewayConfig,
    fallbacks: Vec<(String, Arc<dyn FallbackProvider>)>,
    cache: Option<Arc<dyn ResponseCache>>,
    transport: Option<Arc<dyn Transport>>,
}

impl HttpServerBuilder {
    /// Register a fallback under `name`, replacing a configured one of the same name.
    pub fn fallback(mut self, name: impl Into<String>, provider: Arc<dyn FallbackProvider>) -> Self {
        self.fallbacks.push((name.into(), provider));
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<HttpServer, ConfigError> {
        let config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let mut registry = FallbackRegistry::from_config(&config.fallbacks)?;
        for (name, provider) in self.fallbacks {
            registry.register(name, provider);
        }

        let routes = Arc::new(RouterManager::from_config(&config.routes, &registry)?);

        let admission = AdmissionControl::new();
        for route in routes.routes() {
            admission.register(route.key(), route.allowed_permits());
        }

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::from_config(&config.cache)));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let executor = Arc::new(RequestExecutor::new(
            transport,
            admission.clone(),
            BackoffPolicy::from(&config.retries),
        ));

        let handlers: Vec<Arc<dyn RequestHandler>> = vec![
            Arc::new(StaticDispatcher::new(Arc::clone(&executor))),
            Arc::new(DynamicDispatcher::new(executor, cache)),
        ];
        let chain = Arc::new(DispatchChain::new(Arc::clone(&routes), handlers));

        tracing::info!(
            routes = routes.len(),
            fallbacks = registry.len(),
            "Gateway routes compiled"
        );
        for route in routes.routes() {
            tracing::debug!(
                prefix = %route.prefix(),
                resource_type = %route.resource_type(),
                provider = %route.provider(),
                url = %route.url(),
                cached = route.cached(),
                retries = route.retries(),
                allowed_permits = route.allowed_permits(),
                "Route registered"
            );
        }

        let state = AppState {
            chain,
            max_body_bytes: config.listener.max_body_bytes,
        };
        let router = HttpServer::build_router(&config, state);

        Ok(HttpServer {
            router,
            config,
            admission,
            routes,
        })
    }
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn builder(config: GatewayConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            fallbacks: Vec::new(),
            cache: None,
            transport: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::GATEWAY_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouterManager {
        &self.routes
    }

    /// Per-route admission counters.
    pub fn admission_stats(&self) -> Vec<AdmissionStats> {
        self.admission.snapshot()
    }
}

/// Single entry point for every inbound request.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    tracing::debug!(method = %parts.method, uri = %parts.uri, "Dispatching request");

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, limit = state.max_body_bytes, "Inbound body rejected");
            return state.chain.reject(
                &parts,
                GatewayError::PayloadTooLarge {
                    limit: state.max_body_bytes,
                },
            );
        }
    };

    state.chain.dispatch(parts, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FallbackConfig, RouteConfig};

    #[test]
    fn test_build_registers_bulkheads() {
        let config = GatewayConfig {
            routes: vec![
                RouteConfig {
                    prefix: "/api/".into(),
                    provider: "http://svc".into(),
                    allowed_permits: 4,
                    ..Default::default()
                },
                RouteConfig {
                    prefix: "/open/".into(),
                    provider: "http://svc".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let server = HttpServer::new(config).unwrap();
        let stats = server.admission_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].route, "/api/");
        assert_eq!(stats[0].available, Some(4));
        assert_eq!(stats[1].available, None);
    }

    #[test]
    fn test_build_rejects_unknown_fallback() {
        let config = GatewayConfig {
            routes: vec![RouteConfig {
                prefix: "/api/".into(),
                provider: "http://svc".into(),
                fallback: Some("missing".into()),
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(matches!(
            HttpServer::new(config),
            Err(ConfigError::UnknownFallback { .. })
        ));
    }

    #[test]
    fn test_builder_fallback_satisfies_route() {
        let config = GatewayConfig {
            fallbacks: vec![FallbackConfig {
                name: "configured".into(),
                status: 200,
                content_type: None,
                body: serde_json::json!({"ok": true}),
            }],
            routes: vec![RouteConfig {
                prefix: "/api/".into(),
                provider: "http://svc".into(),
                fallback: Some("programmatic".into()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let provider = Arc::new(crate::fallback::StaticFallback::new(
            axum::http::StatusCode::OK,
            axum::http::HeaderValue::from_static("application/json"),
            "{}",
        ));
        let server = HttpServer::builder(config)
            .fallback("programmatic", provider)
            .build()
            .unwrap();
        assert_eq!(server.routes().len(), 1);
    }

    #[test]
    fn test_build_validates_config() {
        let config = GatewayConfig {
            routes: vec![RouteConfig {
                prefix: "api".into(),
                provider: "http://svc".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(matches!(HttpServer::new(config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_build_rejects_error_status_fallback() {
        let config = GatewayConfig {
            fallbacks: vec![FallbackConfig {
                name: "down".into(),
                status: 502,
                content_type: None,
                body: serde_json::json!("down"),
            }],
            routes: vec![RouteConfig {
                prefix: "/api/".into(),
                provider: "http://127.0.0.1:9".into(),
                fallback: Some("down".into()),
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(matches!(HttpServer::new(config), Err(ConfigError::Validation(_))));
    }
}
