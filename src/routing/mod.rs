//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → manager.rs (longest-prefix lookup)
//!     → router.rs (matched route, prefix trimming)
//!     → Return: matched Router or the default pass-through Router
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Resolve fallbacks, compile header policy
//!     → Sort by prefix length
//!     → Freeze as immutable RouterManager
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod manager;
pub mod router;

pub use manager::RouterManager;
pub use router::{Router, DEFAULT_ROUTE_KEY};
