//! Response cache consulted by the dynamic dispatcher.
//!
//! # Design Decisions
//! - Keyed by the trimmed path (query string included), nothing else
//! - Only backend successes are stored; fallbacks never are
//! - Get-then-put is not atomic: concurrent misses may each reach the
//!   backend and the last writer wins

pub mod memory;

pub use memory::MemoryCache;

/// Key/value store for buffered response bodies.
pub trait ResponseCache: Send + Sync {
    /// Cached body for `key`, if present and live.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, visible to the next `get` in this process.
    fn put(&self, key: &str, value: String);
}
