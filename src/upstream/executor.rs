//! Request execution against backends.
//!
//! # Responsibilities
//! - Admit the request through its route bulkhead
//! - Run up to `retries + 1` attempts, each bounded by the route timeout
//! - Fall back to the route's provider once retryable failures run out
//! - Materialize the response buffered or as a temporary file
//!
//! # Design Decisions
//! - The admission permit is held across every attempt of a request
//! - Only backend unavailability and timeouts reach the fallback; admission
//!   rejections and 4xx responses do not
//! - Downloads never fall back: a file response cannot be synthesized

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use tempfile::TempDir;

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::resilience::{classify, is_retryable, AdmissionControl, BackoffPolicy};
use crate::upstream::request::resolve_target;
use crate::upstream::transport::{Transport, TransportError, UpstreamResponse};
use crate::upstream::ForwardedRequest;

/// Where a buffered response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Backend,
    Fallback,
}

/// Result of a buffered execution.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub response: UpstreamResponse,
    pub source: ResponseSource,
}

/// A backend body stored on disk. The directory is removed on drop.
#[derive(Debug)]
pub struct DownloadedFile {
    pub dir: TempDir,
    pub path: PathBuf,
    pub file_name: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub size: u64,
}

/// Runs forwarded requests with admission, retries and fallback.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    admission: AdmissionControl,
    backoff: BackoffPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, admission: AdmissionControl, backoff: BackoffPolicy) -> Self {
        Self {
            transport,
            admission,
            backoff,
        }
    }

    pub fn admission(&self) -> &AdmissionControl {
        &self.admission
    }

    /// Execute `request` against `provider` and buffer the body.
    pub async fn send(
        &self,
        provider: &str,
        request: &ForwardedRequest,
        charset: &str,
    ) -> Result<Outcome, GatewayError> {
        let url = resolve_target(provider, &request.path);
        let result = self
            .execute(request, &url, || self.transport.send(&url, request, charset))
            .await;

        match result {
            Ok(response) => Ok(Outcome {
                response,
                source: ResponseSource::Backend,
            }),
            Err(error) if is_retryable(&error) => match &request.fallback {
                Some(fallback) => {
                    tracing::warn!(
                        route = %request.route_key,
                        url = %url,
                        error = %error,
                        "Backend exhausted, serving fallback"
                    );
                    metrics::record_fallback(&request.route_key);
                    Ok(Outcome {
                        response: fallback.fallback(request),
                        source: ResponseSource::Fallback,
                    })
                }
                None => Err(error),
            },
            Err(error) => Err(error),
        }
    }

    /// Execute `request` against `provider`, streaming the body to a
    /// temporary file reported as `file_name`.
    pub async fn download(
        &self,
        provider: &str,
        request: &ForwardedRequest,
        file_name: &str,
    ) -> Result<DownloadedFile, GatewayError> {
        let url = resolve_target(provider, &request.path);
        let dir = tempfile::Builder::new().prefix("edge-gateway-").tempdir()?;
        let path = dir.path().join("payload");

        let meta = self
            .execute(request, &url, || self.transport.download(&url, request, &path))
            .await?;

        Ok(DownloadedFile {
            dir,
            path,
            file_name: file_name.to_string(),
            status: meta.status,
            headers: meta.headers,
            size: meta.size,
        })
    }

    async fn execute<T, F, Fut>(&self, request: &ForwardedRequest, url: &str, attempt: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let _permit = self
            .admission
            .acquire(&request.route_key, request.allowed_permits, request.timeout)
            .await?;

        let max_attempts = request.retries.saturating_add(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            metrics::record_backend_attempt(&request.route_key);

            let error = match tokio::time::timeout(request.timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => classify(e, url, request.timeout),
                Err(_) => GatewayError::BackendTimeout {
                    url: url.to_string(),
                    timeout: request.timeout,
                },
            };

            if !is_retryable(&error) || attempts >= max_attempts {
                tracing::debug!(
                    route = %request.route_key,
                    url = %url,
                    attempts = attempts,
                    error = %error,
                    "Backend request failed"
                );
                return Err(error);
            }

            let delay = self.backoff.delay(attempts);
            tracing::info!(
                route = %request.route_key,
                url = %url,
                attempt = attempts,
                delay = ?delay,
                error = %error,
                "Retrying backend request"
            );
            metrics::record_retry(&request.route_key);
            tokio::time::sleep(delay).await;
        }
    }
}
