//! Resumable chunked upload.
//!
//! # Protocol
//! 1. **Session init**: declare the total size; the remote returns an upload
//!    target and a resource id.
//! 2. **Chunk transfer**: send `[offset, offset + chunk_size)` until the
//!    offset reaches the total size. The offset returned by the remote is
//!    authoritative and resets the retry counter. A resource-gone response
//!    aborts at once. Any other failure is retried after a fixed backoff
//!    until `max_retries` consecutive failures, at which point the upload
//!    aborts without another send.
//! 3. **Finalize**: look up the resource's public link.
//!
//! Chunks are sent one at a time, in order.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::adapter::{HostingAdapter, SessionTarget};
use crate::config::UploadConfig;
use crate::error::{ChunkFailure, ChunkFailureKind, UploadError, UploadResult};
use crate::metrics::{record_chunk_retry, record_upload};

/// State of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub target: SessionTarget,
    /// Total bytes declared at session init
    pub size: u64,
    /// Last offset acknowledged by the remote
    pub offset: u64,
    /// Consecutive failed sends at the current offset
    pub retries: u32,
}

impl UploadSession {
    pub fn new(target: SessionTarget, size: u64) -> Self {
        Self {
            target,
            size,
            offset: 0,
            retries: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.size
    }
}

/// A finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedVideo {
    pub link: String,
    pub resource_id: String,
    pub size: u64,
}

/// Drives the three-phase upload against a [`HostingAdapter`].
#[derive(Clone)]
pub struct ResumableUploader {
    adapter: Arc<dyn HostingAdapter>,
    chunk_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ResumableUploader {
    pub fn new(adapter: Arc<dyn HostingAdapter>, config: &UploadConfig) -> Self {
        Self {
            adapter,
            chunk_size: config.chunk_size.max(1),
            max_retries: config.max_retries.max(1),
            retry_backoff: config.retry_backoff,
        }
    }

    /// Upload the file at `path`.
    ///
    /// When `cancel` flips to `true` the upload stops before the next send
    /// (or during a backoff wait) with [`UploadError::Cancelled`].
    pub async fn upload(
        &self,
        path: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> UploadResult<UploadedVideo> {
        let started = Instant::now();
        let result = self.run(path, cancel).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(UploadError::Cancelled) => "cancelled",
            Err(_) => "failure",
        };
        record_upload(outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn run(
        &self,
        path: &Path,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> UploadResult<UploadedVideo> {
        let mut file = File::open(path).await?;
        let size = file.metadata().await?.len();

        let target = self.adapter.create_session(size).await?;
        info!(
            "Upload session {} opened for {} ({} bytes)",
            target.resource_id,
            path.display(),
            size
        );

        let mut session = UploadSession::new(target, size);
        self.transfer(&mut file, &mut session, &mut cancel).await?;

        let link = self.adapter.lookup_link(&session.target).await?;
        info!("Upload {} complete: {}", session.target.resource_id, link);

        Ok(UploadedVideo {
            link,
            resource_id: session.target.resource_id,
            size,
        })
    }

    async fn transfer(
        &self,
        file: &mut File,
        session: &mut UploadSession,
        cancel: &mut Option<watch::Receiver<bool>>,
    ) -> UploadResult<()> {
        while !session.is_complete() {
            if is_cancelled(cancel) {
                return Err(UploadError::Cancelled);
            }

            let chunk = read_chunk(file, session.offset, self.chunk_len(session)).await?;
            let sent_at = session.offset;

            let failure = match self
                .adapter
                .send_chunk(&session.target, sent_at, chunk)
                .await
            {
                Ok(remote) if remote > sent_at && remote <= session.size => {
                    debug!("Chunk acknowledged: {} -> {}", sent_at, remote);
                    session.offset = remote;
                    session.retries = 0;
                    continue;
                }
                Ok(remote) => ChunkFailure::Transient(format!(
                    "remote offset {} after sending at {} of {}",
                    remote, sent_at, session.size
                )),
                Err(failure) => failure,
            };

            session.retries += 1;
            if let ChunkFailure::Gone { .. } = failure {
                return Err(UploadError::ChunkTransfer {
                    kind: ChunkFailureKind::Gone,
                    offset: sent_at,
                    attempts: session.retries,
                    message: failure.to_string(),
                });
            }

            record_chunk_retry();
            if session.retries >= self.max_retries {
                return Err(UploadError::ChunkTransfer {
                    kind: ChunkFailureKind::Exhausted,
                    offset: sent_at,
                    attempts: session.retries,
                    message: failure.to_string(),
                });
            }

            warn!(
                "Chunk at offset {} failed ({}), retry {}/{} in {:?}",
                sent_at, failure, session.retries, self.max_retries, self.retry_backoff
            );
            self.backoff(cancel).await?;
        }
        Ok(())
    }

    fn chunk_len(&self, session: &UploadSession) -> usize {
        let remaining = session.size - session.offset;
        remaining.min(self.chunk_size as u64) as usize
    }

    async fn backoff(&self, cancel: &mut Option<watch::Receiver<bool>>) -> UploadResult<()> {
        match cancel {
            Some(rx) => {
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_backoff) => Ok(()),
                    _ = wait_for_cancel(rx) => Err(UploadError::Cancelled),
                }
            }
            None => {
                tokio::time::sleep(self.retry_backoff).await;
                Ok(())
            }
        }
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn read_chunk(file: &mut File, offset: u64, len: usize) -> UploadResult<Bytes> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::VimeoAdapter;
    use serde_json::json;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn config(server: &MockServer, chunk_size: usize) -> UploadConfig {
        UploadConfig {
            api_base: server.uri(),
            access_token: "t".into(),
            chunk_size,
            max_retries: 5,
            retry_backoff: Duration::from_millis(5),
            ..UploadConfig::default()
        }
    }

    fn uploader(server: &MockServer, chunk_size: usize) -> ResumableUploader {
        let config = config(server, chunk_size);
        ResumableUploader::new(Arc::new(VimeoAdapter::new(&config).unwrap()), &config)
    }

    fn file_of(len: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![9u8; len]).unwrap();
        file.flush().unwrap();
        file
    }

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/me/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": "/videos/99",
                "upload": {"upload_link": format!("{}/upload/99", server.uri())}
            })))
            .mount(server)
            .await;
    }

    async fn mount_lookup(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/videos/99"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"link": "https://vimeo.com/99"})),
            )
            .mount(server)
            .await;
    }

    /// Acknowledges every chunk in full, recording the offsets it saw.
    struct Acknowledge {
        seen: Arc<Mutex<Vec<u64>>>,
    }

    impl Respond for Acknowledge {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let offset: u64 = request
                .headers
                .get("upload-offset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap();
            self.seen.lock().unwrap().push(offset);
            let next = offset + request.body.len() as u64;
            ResponseTemplate::new(204).insert_header("Upload-Offset", next.to_string().as_str())
        }
    }

    /// Fails the first `failures` sends with 500, then acknowledges.
    struct FlakyThenAcknowledge {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Respond for FlakyThenAcknowledge {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return ResponseTemplate::new(500);
            }
            let offset: u64 = request
                .headers
                .get("upload-offset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap();
            let next = offset + request.body.len() as u64;
            ResponseTemplate::new(204).insert_header("Upload-Offset", next.to_string().as_str())
        }
    }

    #[tokio::test]
    async fn test_upload_in_chunks_then_lookup() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        mount_lookup(&server).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        Mock::given(method("PATCH"))
            .and(path("/upload/99"))
            .respond_with(Acknowledge { seen: seen.clone() })
            .expect(3)
            .mount(&server)
            .await;

        let file = file_of(25);
        let uploaded = uploader(&server, 10)
            .upload(file.path(), None)
            .await
            .unwrap();

        assert_eq!(uploaded.link, "https://vimeo.com/99");
        assert_eq!(uploaded.resource_id, "/videos/99");
        assert_eq!(uploaded.size, 25);
        assert_eq!(*seen.lock().unwrap(), vec![0, 10, 20]);
    }

    #[tokio::test]
    async fn test_remote_offset_is_authoritative() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        mount_lookup(&server).await;
        // The remote only keeps 4 bytes of the first chunk.
        Mock::given(method("PATCH"))
            .and(header("upload-offset", "0"))
            .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "4"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(header("upload-offset", "4"))
            .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "14"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(header("upload-offset", "14"))
            .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "20"))
            .expect(1)
            .mount(&server)
            .await;

        let file = file_of(20);
        uploader(&server, 10)
            .upload(file.path(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_five_transient_failures_exhaust_without_sixth_send() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(503))
            .expect(5)
            .mount(&server)
            .await;

        let file = file_of(8);
        let err = uploader(&server, 4)
            .upload(file.path(), None)
            .await
            .unwrap_err();

        match err {
            UploadError::ChunkTransfer {
                kind,
                offset,
                attempts,
                ..
            } => {
                assert_eq!(kind, ChunkFailureKind::Exhausted);
                assert_eq!(offset, 0);
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_resets_retry_counter() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        mount_lookup(&server).await;
        // Four failures, then every chunk succeeds: never reaches the ceiling.
        Mock::given(method("PATCH"))
            .respond_with(FlakyThenAcknowledge {
                failures: 4,
                calls: AtomicUsize::new(0),
            })
            .mount(&server)
            .await;

        let file = file_of(12);
        assert!(uploader(&server, 4)
            .upload(file.path(), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let file = file_of(8);
        let err = uploader(&server, 4)
            .upload(file.path(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::ChunkTransfer {
                kind: ChunkFailureKind::Gone,
                attempts: 1,
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_stalled_offset_counts_as_failure() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "0"))
            .expect(5)
            .mount(&server)
            .await;

        let file = file_of(8);
        let err = uploader(&server, 4)
            .upload(file.path(), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_session_init_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let file = file_of(8);
        let err = uploader(&server, 4)
            .upload(file.path(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::SessionInit(_)));
    }

    #[tokio::test]
    async fn test_lookup_failure_after_transfer() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("PATCH"))
            .respond_with(Acknowledge {
                seen: Arc::new(Mutex::new(Vec::new())),
            })
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "x"})))
            .mount(&server)
            .await;

        let file = file_of(8);
        let err = uploader(&server, 4)
            .upload(file.path(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Lookup(_)));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_send() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "4"))
            .expect(0)
            .mount(&server)
            .await;

        let (_tx, rx) = watch::channel(true);
        let file = file_of(8);
        let err = uploader(&server, 4)
            .upload(file.path(), Some(rx))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
    }
}
