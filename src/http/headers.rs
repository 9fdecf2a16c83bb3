//! Header hygiene between client, gateway and backend.
//!
//! # Design Decisions
//! - Hop-by-hop headers never cross the gateway in either direction
//! - Framing headers (length, encoding) are recomputed, never copied
//! - Headers named in `Connection` are treated as hop-by-hop too

use axum::http::{header, HeaderMap, HeaderName};

/// Headers that describe a single connection (RFC 9110 §7.6.1).
pub const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Headers sent to the backend for a forwarded request.
///
/// The client library sets host, length and encoding for the new hop.
pub fn upstream_request_headers(forwarded: &HeaderMap) -> HeaderMap {
    let mut headers = forwarded.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::ACCEPT_ENCODING);
    headers
}

/// Backend headers worth relaying on a streamed file response.
///
/// Disposition is dropped here and only set by the gateway for attachments.
pub fn relayed_download_headers(backend: &HeaderMap) -> HeaderMap {
    let mut headers = backend.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONTENT_DISPOSITION);
    headers
}
