//! Gateway error taxonomy and its mapping onto client responses.
//!
//! # Design Decisions
//! - Every failure a dispatcher can hit is one `GatewayError` variant
//! - Gateway-generated bodies carry only the canonical reason phrase
//! - Backend 4xx responses are relayed as-is (status, content type, body)

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::upstream::UpstreamResponse;

/// Errors produced while dispatching a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Only the default pass-through route matched.
    #[error("no route resolved for {path}")]
    RouteNotResolved { path: String },

    /// No admission permit became available within the route timeout.
    #[error("admission to route {route} timed out after {timeout:?}")]
    AdmissionTimeout { route: String, timeout: Duration },

    /// Connection failure or 5xx from the backend, retries exhausted.
    #[error("backend {url} unavailable: {reason}")]
    BackendUnavailable { url: String, reason: String },

    /// The backend did not answer within the route timeout.
    #[error("backend {url} timed out after {timeout:?}")]
    BackendTimeout { url: String, timeout: Duration },

    /// The backend rejected the request (4xx). Never retried.
    #[error("backend {url} rejected the request with status {}", .response.status)]
    BackendClientError {
        url: String,
        response: UpstreamResponse,
    },

    /// A file transfer failed after the response headers were committed.
    #[error("stream transfer failed: {0}")]
    StreamTransferFailed(#[source] std::io::Error),

    /// The inbound body exceeded the configured limit.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The inbound request could not be turned into a backend request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Local failure, e.g. creating the temporary download file.
    #[error("local I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Status code reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotResolved { .. } => StatusCode::NOT_FOUND,
            GatewayError::AdmissionTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::BackendTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BackendClientError { response, .. } => response.status,
            GatewayError::StreamTransferFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::RouteNotResolved { .. } => "route_not_resolved",
            GatewayError::AdmissionTimeout { .. } => "admission_timeout",
            GatewayError::BackendUnavailable { .. } => "backend_unavailable",
            GatewayError::BackendTimeout { .. } => "backend_timeout",
            GatewayError::BackendClientError { .. } => "backend_client_error",
            GatewayError::StreamTransferFailed(_) => "stream_transfer_failed",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::Io(_) => "io",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (content_type, body) = match self {
            GatewayError::BackendClientError { response, .. } => {
                let content_type = response
                    .content_type()
                    .map(|value| crate::http::response::utf8_content_type(value).into_owned())
                    .unwrap_or_else(|| crate::http::response::DEFAULT_CONTENT_TYPE.to_string());
                (content_type, response.body)
            }
            _ => (
                "text/plain; charset=utf-8".to_string(),
                status.canonical_reason().unwrap_or("Error").to_string(),
            ),
        };

        let length = body.len();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        response
    }
}
