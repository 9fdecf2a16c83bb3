//! Retry classification.
//!
//! # Responsibilities
//! - Turn a failed backend attempt into a `GatewayError`
//! - Decide whether that error is worth another attempt
//!
//! # Design Decisions
//! - Connection failures, timeouts and 5xx are retryable
//! - 4xx is final: the backend answered and will answer the same again
//! - The HTTP method is not considered; routes opt in through `retries`

use std::time::Duration;

use crate::error::GatewayError;
use crate::upstream::TransportError;

/// Map a transport failure for `url` onto the gateway taxonomy.
pub fn classify(error: TransportError, url: &str, timeout: Duration) -> GatewayError {
    match error {
        TransportError::Connect(reason) | TransportError::Body(reason) => GatewayError::BackendUnavailable {
            url: url.to_string(),
            reason,
        },
        TransportError::Timeout => GatewayError::BackendTimeout {
            url: url.to_string(),
            timeout,
        },
        TransportError::Status(response) if response.status.is_client_error() => {
            GatewayError::BackendClientError {
                url: url.to_string(),
                response,
            }
        }
        TransportError::Status(response) => GatewayError::BackendUnavailable {
            url: url.to_string(),
            reason: format!("status {}", response.status),
        },
        TransportError::InvalidRequest(reason) => GatewayError::InvalidRequest(reason),
        TransportError::Io(e) => GatewayError::Io(e),
    }
}

/// Whether another attempt may succeed where this one failed.
pub fn is_retryable(error: &GatewayError) -> bool {
    matches!(
        error,
        GatewayError::BackendUnavailable { .. } | GatewayError::BackendTimeout { .. }
    )
}
