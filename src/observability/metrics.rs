//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_backend_attempts_total` (counter): backend attempts by route
//! - `gateway_retries_total` (counter): retries by route
//! - `gateway_fallbacks_total` (counter): fallback responses by route
//! - `gateway_admission_rejections_total` (counter): admission timeouts
//! - `gateway_inflight_requests` (gauge): admitted backend calls by route
//! - `gateway_cache_lookups_total` (counter): cache lookups by route, result
//! - `gateway_stream_bytes_total` (counter): file bytes streamed by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels stay low-cardinality: route key, status, result

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a finished inbound request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("gateway_requests_total", "route" => route.to_string(), "status" => status.clone()).increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_attempt(route: &str) {
    counter!("gateway_backend_attempts_total", "route" => route.to_string()).increment(1);
}

pub fn record_retry(route: &str) {
    counter!("gateway_retries_total", "route" => route.to_string()).increment(1);
}

pub fn record_fallback(route: &str) {
    counter!("gateway_fallbacks_total", "route" => route.to_string()).increment(1);
}

pub fn record_admission_rejected(route: &str) {
    counter!("gateway_admission_rejections_total", "route" => route.to_string()).increment(1);
}

pub fn set_in_flight(route: &str, in_flight: usize) {
    gauge!("gateway_inflight_requests", "route" => route.to_string()).set(in_flight as f64);
}

pub fn record_cache_lookup(route: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gateway_cache_lookups_total", "route" => route.to_string(), "result" => result).increment(1);
}

pub fn record_stream_bytes(route: &str, bytes: u64) {
    counter!("gateway_stream_bytes_total", "route" => route.to_string()).increment(bytes);
}
