//! Degraded responses served when a backend is unavailable.
//!
//! # Data Flow
//! ```text
//! Config load:
//!     [[fallbacks]] → static_response.rs → FallbackRegistry (name → provider)
//!     RouteConfig.fallback (name) → resolved once into Router
//!
//! Request time:
//!     RequestExecutor exhausts retries → provider.fallback(&request)
//! ```
//!
//! # Design Decisions
//! - Providers are resolved by name at load time, never reflectively
//! - Providers are pure: same request, same response, no side effects
//! - Code can register providers next to the configured ones

pub mod static_response;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::{ConfigError, FallbackConfig};
use crate::upstream::{ForwardedRequest, UpstreamResponse};

pub use static_response::StaticFallback;

/// Produces the response returned in place of a failed backend call.
pub trait FallbackProvider: Send + Sync + Debug {
    fn fallback(&self, request: &ForwardedRequest) -> UpstreamResponse;
}

/// Named fallback providers.
#[derive(Debug, Clone, Default)]
pub struct FallbackRegistry {
    providers: HashMap<String, Arc<dyn FallbackProvider>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding one `StaticFallback` per configured entry.
    pub fn from_config(configs: &[FallbackConfig]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for config in configs {
            let provider = StaticFallback::from_config(config)?;
            registry.register(config.name.clone(), Arc::new(provider));
        }
        Ok(registry)
    }

    /// Register `provider` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn FallbackProvider>) {
        let name = name.into();
        if self.providers.insert(name.clone(), provider).is_some() {
            tracing::debug!(fallback = %name, "Fallback provider replaced");
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn FallbackProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[derive(Debug)]
    struct EchoPath;

    impl FallbackProvider for EchoPath {
        fn fallback(&self, request: &ForwardedRequest) -> UpstreamResponse {
            UpstreamResponse::new(StatusCode::OK, request.path.clone())
        }
    }

    #[test]
    fn test_registry_resolves_configured_and_registered() {
        let configs = vec![FallbackConfig {
            name: "empty".into(),
            status: 200,
            content_type: None,
            body: serde_json::json!([]),
        }];
        let mut registry = FallbackRegistry::from_config(&configs).unwrap();
        registry.register("echo", Arc::new(EchoPath));

        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("empty").is_some());
        assert!(registry.resolve("missing").is_none());

        let request = ForwardedRequest::for_test("/users/7");
        let response = registry.resolve("echo").unwrap().fallback(&request);
        assert_eq!(response.body, "/users/7");
    }
}
