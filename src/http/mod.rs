//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit)
//!     → request.rs (InboundRequest, keep-alive detection)
//!     → [dispatch chain decides how to answer]
//!     → response.rs (framing: length, type, disposition, keep-alive)
//!     → Send to client
//! ```
//!
//! headers.rs holds the header policy shared by both directions.

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use request::InboundRequest;
pub use server::{HttpServer, HttpServerBuilder};
