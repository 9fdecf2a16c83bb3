//! Structured logging setup.
//!
//! # Design Decisions
//! - Uses the tracing crate for structured log events
//! - RUST_LOG wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when RUST_LOG is unset.
pub fn default_filter(level: &str) -> String {
    format!("edge_gateway={level},tower_http={level}")
}

/// Install the global subscriber. Call once, from the binary.
pub fn init(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level))))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
