//! Edge gateway library.
//!
//! Routes inbound HTTP requests by longest path prefix and answers them by
//! redirecting, streaming a downloaded resource, or proxying to a backend
//! with per-route admission control, retries, fallbacks and caching.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
