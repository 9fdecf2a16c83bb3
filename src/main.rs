//! Edge Gateway (v1)
//!
//! A prefix-routed edge gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────────┐
//!                              │                      EDGE GATEWAY                        │
//!                              │                                                          │
//!     Client Request           │  ┌─────────┐    ┌──────────┐    ┌──────────────┐         │
//!     ─────────────────────────┼─▶│  http   │───▶│ routing  │───▶│   static     │─────────┼──▶ 302 / file
//!                              │  │ server  │    │ manager  │    │  dispatcher  │         │
//!                              │  └─────────┘    └──────────┘    └──────┬───────┘         │
//!                              │                                       │ pass             │
//!                              │                                       ▼                  │
//!                              │                               ┌──────────────┐          │
//!                              │                               │   dynamic    │◀──cache  │
//!                              │                               │  dispatcher  │          │
//!                              │                               └──────┬───────┘          │
//!                              │                                       │                  │
//!                              │                                       ▼                  │
//!     Client Response          │  ┌─────────┐                  ┌──────────────┐         │
//!     ◀────────────────────────┼──│response │◀─────────────────│   executor   │◀────────┼──── Backend
//!                              │  │ framing │                  │bulkhead/retry│         │
//!                              │  └─────────┘                  └──────────────┘         │
//!                              │                                                          │
//!                              │  ┌────────────────────────────────────────────────────┐ │
//!                              │  │              Cross-Cutting Concerns                 │ │
//!                              │  │  ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌─────────┐ │ │
//!                              │  │  │ config  │ │ fallback │ │observa-  │ │lifecycle│ │ │
//!                              │  │  │         │ │ registry │ │ bility   │ │shutdown │ │ │
//!                              │  │  └─────────┘ └──────────┘ └──────────┘ └─────────┘ │ │
//!                              │  └────────────────────────────────────────────────────┘ │
//!                              └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::lifecycle::{shutdown_on_signal, Shutdown};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "edge-gateway", version, about = "Prefix-routed edge gateway")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "EDGE_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long, env = "EDGE_GATEWAY_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);

    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_file = ?args.config,
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        fallbacks = config.fallbacks.len(),
        request_timeout_secs = config.timeouts.request_secs,
        max_body_bytes = config.listener.max_body_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown));

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
