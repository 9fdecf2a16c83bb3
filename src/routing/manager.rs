//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes ordered by specificity
//! - Look up the route for a request path
//! - Return the default pass-through route when nothing matches
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (acceptable for typical route counts)
//! - Longest prefix wins; equal lengths keep registration order

use std::sync::Arc;

use crate::config::{ConfigError, RouteConfig};
use crate::fallback::FallbackRegistry;
use crate::routing::router::Router;

/// Longest-prefix route table.
#[derive(Debug)]
pub struct RouterManager {
    routes: Vec<Arc<Router>>,
    default_route: Arc<Router>,
}

impl RouterManager {
    /// Build the table from already compiled routes.
    pub fn new(routes: Vec<Router>) -> Self {
        let mut routes: Vec<Arc<Router>> = routes.into_iter().map(Arc::new).collect();
        // Stable sort keeps registration order among equal-length prefixes.
        routes.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));

        Self {
            routes,
            default_route: Arc::new(Router::pass_through()),
        }
    }

    /// Compile every configured route.
    pub fn from_config(configs: &[RouteConfig], fallbacks: &FallbackRegistry) -> Result<Self, ConfigError> {
        let routes = configs
            .iter()
            .map(|config| Router::from_config(config, fallbacks))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    /// Resolve the route for `path`. Never fails.
    pub fn match_path(&self, path: &str) -> Arc<Router> {
        self.routes
            .iter()
            .find(|route| route.matches(path))
            .cloned()
            .unwrap_or_else(|| self.default_route.clone())
    }

    /// Routes in match order.
    pub fn routes(&self) -> &[Arc<Router>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
