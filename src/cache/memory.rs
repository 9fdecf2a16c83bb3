//! In-process response cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::cache::ResponseCache;
use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    stored_at: Instant,
}

/// A thread-safe cache with optional TTL and capacity.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
    max_entries: Option<usize>,
}

impl MemoryCache {
    /// Create an unbounded cache whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl: config.ttl_secs.map(Duration::from_secs),
            max_entries: config.max_entries,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl.is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }

    fn evict_oldest(&self) {
        let oldest = self
            .inner
            .iter()
            .min_by_key(|entry| entry.value().stored_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.inner.remove(&key);
            tracing::trace!(key = %key, "Evicted oldest cache entry");
        }
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        {
            let entry = self.inner.get(key)?;
            if !self.is_expired(entry.value()) {
                return Some(entry.value().value.clone());
            }
        }

        // The read guard must be gone before removing, or the shard deadlocks.
        self.inner.remove_if(key, |_, entry| self.is_expired(entry));
        None
    }

    fn put(&self, key: &str, value: String) {
        if let Some(max) = self.max_entries {
            if max == 0 {
                return;
            }
            if !self.inner.contains_key(key) && self.inner.len() >= max {
                self.evict_oldest();
            }
        }

        self.inner.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}
