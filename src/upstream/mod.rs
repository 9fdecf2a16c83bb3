//! Backend communication subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest + Router
//!     → request.rs (RequestBuilder: header policy, route settings)
//!     → executor.rs (admission → attempts → retry/fallback)
//!     → transport.rs (one attempt over reqwest)
//!     → buffered UpstreamResponse, or DownloadedFile
//!     → transfer.rs (chunked file stream back to the client)
//! ```

pub mod executor;
pub mod request;
pub mod transfer;
pub mod transport;

pub use executor::{DownloadedFile, Outcome, RequestExecutor, ResponseSource};
pub use request::{resolve_target, ForwardedRequest, RequestBuilder};
pub use transfer::FileTransfer;
pub use transport::{DownloadMeta, ReqwestTransport, Transport, TransportError, UpstreamResponse};
