//! Static resources: redirects, streams and file downloads.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::config::ResourceType;
use crate::dispatch::{Dispatch, RequestHandler};
use crate::error::GatewayError;
use crate::http::headers::relayed_download_headers;
use crate::http::response::{self, OCTET_STREAM};
use crate::http::InboundRequest;
use crate::upstream::{FileTransfer, RequestBuilder, RequestExecutor};

/// Serves routes that carry a `url`: redirect, stream and file.
pub struct StaticDispatcher {
    executor: Arc<RequestExecutor>,
}

impl StaticDispatcher {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    async fn serve_download(&self, request: &InboundRequest) -> Result<Response, GatewayError> {
        let router = &request.router;
        let file_name = resolve_file_name(router.url(), router.prefix());
        let forwarded = RequestBuilder::build(request, router.url());

        let file = self
            .executor
            .download(router.provider(), &forwarded, &file_name)
            .await?;

        let mut headers = relayed_download_headers(&file.headers);
        if !headers.contains_key(header::CONTENT_TYPE) {
            let detected = match read_signature(&file.path).await? {
                Some(sniffed) => sniffed,
                None => mime_guess::from_path(&file_name).first_raw().unwrap_or(OCTET_STREAM),
            };
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(detected));
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.size));
        if router.resource_type() == ResourceType::File {
            headers.insert(header::CONTENT_DISPOSITION, response::attachment_disposition(&file_name)?);
        }

        tracing::debug!(
            route = %router.key(),
            file = %file_name,
            bytes = file.size,
            resource_type = %router.resource_type(),
            "Streaming downloaded resource"
        );

        let transfer = FileTransfer::open(file, router.key()).await?;
        Ok(response::streamed(headers, Body::from_stream(transfer)))
    }
}

#[async_trait]
impl RequestHandler for StaticDispatcher {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn handle(&self, request: InboundRequest) -> Result<Dispatch, GatewayError> {
        if request.router.url().is_empty() {
            return Ok(Dispatch::Pass(request));
        }

        match request.router.resource_type() {
            ResourceType::Redirect => Ok(Dispatch::Handled(response::redirect(request.router.url())?)),
            ResourceType::Stream | ResourceType::File => {
                Ok(Dispatch::Handled(self.serve_download(&request).await?))
            }
            ResourceType::Proxy => Ok(Dispatch::Pass(request)),
        }
    }
}

/// Leading-byte signatures recognised when the backend sends no type.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
];

/// Content type recognised from the first bytes of a body.
pub fn sniff_content_type(head: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|(magic, _)| head.starts_with(magic))
        .map(|(_, content_type)| *content_type)
}

async fn read_signature(path: &Path) -> Result<Option<&'static str>, GatewayError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = [0u8; 8];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff_content_type(&head[..filled]))
}

/// Name reported for a downloaded file: the last segment of `url`, else the
/// last segment of `prefix`, else a random UUID.
pub fn resolve_file_name(url: &str, prefix: &str) -> String {
    last_segment(url)
        .or_else(|| last_segment(prefix))
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn last_segment(target: &str) -> Option<String> {
    let target = target.split(['?', '#']).next().unwrap_or_default();
    let path = match target.find("://") {
        Some(scheme_end) => {
            let rest = &target[scheme_end + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or_default()
        }
        None => target,
    };

    let segment = path.rsplit('/').find(|segment| !segment.is_empty())?;
    if segment == "." || segment == ".." {
        return None;
    }

    let cleaned: String = segment
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
