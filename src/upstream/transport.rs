//! Backend transport.
//!
//! # Responsibilities
//! - Send one attempt of a forwarded request and return its outcome
//! - Buffer the body as text, or stream it to a file on disk
//! - Report failures as connection, timeout or status errors
//!
//! # Design Decisions
//! - One attempt per call; retries live in the executor
//! - Any status >= 400 is an error carrying the full response
//! - Hop-by-hop and framing headers are stripped before sending

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::http::headers::upstream_request_headers;
use crate::upstream::ForwardedRequest;

/// A buffered backend (or fallback) response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// What a finished download produced on disk.
#[derive(Debug, Clone)]
pub struct DownloadMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub size: u64,
}

/// Failure of a single backend attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend answered {}", .0.status)]
    Status(UpstreamResponse),

    #[error("response body failed: {0}")]
    Body(String),

    #[error("invalid backend request: {0}")]
    InvalidRequest(String),

    #[error("local I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Carries one attempt of a forwarded request to a backend.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Buffer the response body, decoded with `charset` unless the backend names one.
    async fn send(
        &self,
        url: &str,
        request: &ForwardedRequest,
        charset: &str,
    ) -> Result<UpstreamResponse, TransportError>;

    /// Write the response body to `dest`, replacing any previous content.
    async fn download(
        &self,
        url: &str,
        request: &ForwardedRequest,
        dest: &Path,
    ) -> Result<DownloadMeta, TransportError>;
}

/// `Transport` on a shared `reqwest` connection pool.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn dispatch(&self, url: &str, request: &ForwardedRequest) -> Result<reqwest::Response, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(request.timeout)
            .headers(upstream_request_headers(&request.headers));
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder.send().await.map_err(map_reqwest_error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        url: &str,
        request: &ForwardedRequest,
        charset: &str,
    ) -> Result<UpstreamResponse, TransportError> {
        let response = self.dispatch(url, request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text_with_charset(charset)
            .await
            .map_err(map_reqwest_error)?;

        let upstream = UpstreamResponse { status, headers, body };
        if status.is_client_error() || status.is_server_error() {
            return Err(TransportError::Status(upstream));
        }
        Ok(upstream)
    }

    async fn download(
        &self,
        url: &str,
        request: &ForwardedRequest,
        dest: &Path,
    ) -> Result<DownloadMeta, TransportError> {
        let response = self.dispatch(url, request).await?;
        let status = response.status();
        let headers = response.headers().clone();

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status(UpstreamResponse { status, headers, body }));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut size = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(url = %url, bytes = size, path = %dest.display(), "Download stored");
        Ok(DownloadMeta { status, headers, size })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else if error.is_body() || error.is_decode() {
        TransportError::Body(error.to_string())
    } else {
        TransportError::Connect(error.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable in-memory transport for executor and dispatcher tests.

    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    type Responder = dyn Fn(u32, &ForwardedRequest) -> Result<UpstreamResponse, TransportError> + Send + Sync;

    /// Answers every attempt by calling the responder with the 1-based call number.
    pub(crate) struct MockTransport {
        responder: Box<Responder>,
        delay: Duration,
        calls: AtomicU32,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<(String, ForwardedRequest)>>,
    }

    impl fmt::Debug for MockTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("MockTransport")
                .field("calls", &self.calls())
                .field("peak", &self.peak())
                .finish()
        }
    }

    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl MockTransport {
        pub(crate) fn new<F>(responder: F) -> Self
        where
            F: Fn(u32, &ForwardedRequest) -> Result<UpstreamResponse, TransportError> + Send + Sync + 'static,
        {
            Self {
                responder: Box::new(responder),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        /// Always answer 200 with `body`.
        pub(crate) fn ok(body: &'static str) -> Self {
            Self::new(move |_, _| Ok(UpstreamResponse::new(StatusCode::OK, body)))
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        /// URLs and requests seen so far.
        pub(crate) fn seen(&self) -> Vec<(String, ForwardedRequest)> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }

        async fn attempt(&self, url: &str, request: &ForwardedRequest) -> Result<UpstreamResponse, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((url.to_string(), request.clone()));
            }

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.responder)(call, request)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(
            &self,
            url: &str,
            request: &ForwardedRequest,
            _charset: &str,
        ) -> Result<UpstreamResponse, TransportError> {
            self.attempt(url, request).await
        }

        async fn download(
            &self,
            url: &str,
            request: &ForwardedRequest,
            dest: &Path,
        ) -> Result<DownloadMeta, TransportError> {
            let response = self.attempt(url, request).await?;
            tokio::fs::write(dest, response.body.as_bytes()).await?;
            Ok(DownloadMeta {
                status: response.status,
                headers: response.headers,
                size: response.body.len() as u64,
            })
        }
    }

    /// Responder failing with `status` for the first `failures` calls, then answering `body`.
    pub(crate) fn fail_then_ok(
        failures: u32,
        status: StatusCode,
        body: &'static str,
    ) -> impl Fn(u32, &ForwardedRequest) -> Result<UpstreamResponse, TransportError> + Send + Sync + 'static {
        move |call, _| {
            if call <= failures {
                Err(TransportError::Status(UpstreamResponse::new(status, "unavailable")))
            } else {
                Ok(UpstreamResponse::new(StatusCode::OK, body))
            }
        }
    }
}
