//! Per-route admission control.
//!
//! # Responsibilities
//! - Bound concurrent backend calls per route with a counting semaphore
//! - Reject requests that cannot get a permit within the route timeout
//! - Expose per-route counters through `HttpServer::admission_stats`
//!
//! # Design Decisions
//! - One semaphore per route key, created at load time and shared
//! - Permits are RAII guards: dropping the request releases the slot
//! - `allowed_permits <= 0` means unbounded (no semaphore at all)

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::GatewayError;
use crate::observability::metrics;

#[derive(Debug)]
struct RouteBulkhead {
    semaphore: Option<Arc<Semaphore>>,
    allowed_permits: i64,
    in_flight: AtomicUsize,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl RouteBulkhead {
    fn new(allowed_permits: i64) -> Self {
        let semaphore = if allowed_permits > 0 {
            let permits = usize::try_from(allowed_permits)
                .unwrap_or(usize::MAX)
                .min(Semaphore::MAX_PERMITS);
            Some(Arc::new(Semaphore::new(permits)))
        } else {
            None
        };

        Self {
            semaphore,
            allowed_permits,
            in_flight: AtomicUsize::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }
}

/// Per-route admission counters.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionStats {
    pub route: String,
    pub allowed_permits: i64,
    /// Free permits; `None` for unbounded routes.
    pub available: Option<usize>,
    pub in_flight: usize,
    pub admitted: u64,
    pub rejected: u64,
}

/// Semaphore table keyed by route.
#[derive(Debug, Clone, Default)]
pub struct AdmissionControl {
    routes: Arc<DashMap<String, Arc<RouteBulkhead>>>,
}

impl AdmissionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bulkhead for `route` if it does not exist yet.
    pub fn register(&self, route: &str, allowed_permits: i64) {
        self.routes
            .entry(route.to_string())
            .or_insert_with(|| Arc::new(RouteBulkhead::new(allowed_permits)));
    }

    fn bulkhead(&self, route: &str, allowed_permits: i64) -> Arc<RouteBulkhead> {
        if let Some(existing) = self.routes.get(route) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .routes
            .entry(route.to_string())
            .or_insert_with(|| Arc::new(RouteBulkhead::new(allowed_permits)));
        Arc::clone(entry.value())
    }

    /// Wait up to `timeout` for a permit on `route`.
    pub async fn acquire(
        &self,
        route: &str,
        allowed_permits: i64,
        timeout: Duration,
    ) -> Result<AdmissionPermit, GatewayError> {
        // Map guards are released before awaiting.
        let bulkhead = self.bulkhead(route, allowed_permits);

        let permit = match &bulkhead.semaphore {
            None => None,
            Some(semaphore) => {
                match tokio::time::timeout(timeout, Arc::clone(semaphore).acquire_owned()).await {
                    Ok(Ok(permit)) => Some(permit),
                    Ok(Err(_)) | Err(_) => {
                        bulkhead.rejected.fetch_add(1, Ordering::Relaxed);
                        metrics::record_admission_rejected(route);
                        tracing::warn!(
                            route = %route,
                            allowed_permits = bulkhead.allowed_permits,
                            timeout_ms = timeout.as_millis() as u64,
                            "Admission timed out"
                        );
                        return Err(GatewayError::AdmissionTimeout {
                            route: route.to_string(),
                            timeout,
                        });
                    }
                }
            }
        };

        let in_flight = bulkhead.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        bulkhead.admitted.fetch_add(1, Ordering::Relaxed);
        metrics::set_in_flight(route, in_flight);

        Ok(AdmissionPermit {
            _permit: permit,
            route: route.to_string(),
            bulkhead,
        })
    }

    /// Counters for every known route, sorted by route key.
    pub fn snapshot(&self) -> Vec<AdmissionStats> {
        let mut stats: Vec<AdmissionStats> = self
            .routes
            .iter()
            .map(|entry| {
                let bulkhead = entry.value();
                AdmissionStats {
                    route: entry.key().clone(),
                    allowed_permits: bulkhead.allowed_permits,
                    available: bulkhead.semaphore.as_ref().map(|s| s.available_permits()),
                    in_flight: bulkhead.in_flight.load(Ordering::Relaxed),
                    admitted: bulkhead.admitted.load(Ordering::Relaxed),
                    rejected: bulkhead.rejected.load(Ordering::Relaxed),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.route.cmp(&b.route));
        stats
    }
}

/// Holds one admission slot until dropped.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: Option<OwnedSemaphorePermit>,
    route: String,
    bulkhead: Arc<RouteBulkhead>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let remaining = self.bulkhead.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::set_in_flight(&self.route, remaining);
        tracing::trace!(route = %self.route, in_flight = remaining, "Admission permit released");
    }
}
