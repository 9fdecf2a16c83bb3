//! Chunked delivery of downloaded files to the client.
//!
//! The stream owns the temporary directory, so the file lives exactly as
//! long as the response body that reads it.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tempfile::TempDir;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::upstream::executor::DownloadedFile;

/// Size of each chunk read from disk.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Streams a downloaded file in bounded chunks, tracing progress.
pub struct FileTransfer {
    inner: ReaderStream<File>,
    _dir: TempDir,
    route: String,
    file_name: String,
    total: u64,
    sent: u64,
    finished: bool,
}

impl FileTransfer {
    /// Open `file` for streaming on behalf of `route`.
    pub async fn open(file: DownloadedFile, route: &str) -> Result<Self, GatewayError> {
        let handle = File::open(&file.path).await?;
        Ok(Self {
            inner: ReaderStream::with_capacity(handle, CHUNK_SIZE),
            _dir: file.dir,
            route: route.to_string(),
            file_name: file.file_name,
            total: file.size,
            sent: 0,
            finished: false,
        })
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Stream for FileTransfer {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                metrics::record_stream_bytes(&this.route, chunk.len() as u64);
                tracing::trace!(
                    route = %this.route,
                    file = %this.file_name,
                    progress = this.sent,
                    total = this.total,
                    "Transfer progress"
                );
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                let failure = GatewayError::StreamTransferFailed(e);
                tracing::error!(
                    route = %this.route,
                    file = %this.file_name,
                    sent = this.sent,
                    total = this.total,
                    error = %failure,
                    "File transfer failed"
                );
                Poll::Ready(Some(Err(std::io::Error::other(failure))))
            }
            Poll::Ready(None) => {
                if !this.finished {
                    this.finished = true;
                    tracing::info!(
                        route = %this.route,
                        file = %this.file_name,
                        bytes = this.sent,
                        "File transfer complete"
                    );
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for FileTransfer {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                route = %self.route,
                file = %self.file_name,
                sent = self.sent,
                total = self.total,
                "File transfer abandoned before completion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};

    async fn downloaded(content: &[u8]) -> DownloadedFile {
        let dir = tempfile::Builder::new().prefix("edge-gateway-test-").tempdir().unwrap();
        let path = dir.path().join("payload");
        tokio::fs::write(&path, content).await.unwrap();
        DownloadedFile {
            dir,
            path,
            file_name: "data.bin".into(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            size: content.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_streams_in_bounded_chunks() {
        let content = vec![7u8; CHUNK_SIZE * 2 + 100];
        let mut transfer = FileTransfer::open(downloaded(&content).await, "/files/").await.unwrap();
        assert_eq!(transfer.total(), content.len() as u64);

        let mut received = Vec::new();
        while let Some(chunk) = transfer.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= CHUNK_SIZE);
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, content);
    }

    #[tokio::test]
    async fn test_temp_dir_removed_with_stream() {
        let file = downloaded(b"abc").await;
        let dir = file.dir.path().to_path_buf();

        let transfer = FileTransfer::open(file, "/files/").await.unwrap();
        assert!(dir.exists());
        drop(transfer);
        assert!(!dir.exists());
    }
}
