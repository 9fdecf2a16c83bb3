//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → bulkhead.rs (acquire route permit, bounded by route timeout)
//!     → attempt, bounded by route timeout
//!     → On failure: retries.rs (classify, retry with backoff.rs delay)
//!     → Budget exhausted: fallback or error to the dispatcher
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Retry classification is explicit and tested, not inferred
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod bulkhead;
pub mod retries;

pub use backoff::BackoffPolicy;
pub use bulkhead::{AdmissionControl, AdmissionPermit, AdmissionStats};
pub use retries::{classify, is_retryable};
