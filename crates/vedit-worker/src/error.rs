//! Worker error types.
//!
//! Every pipeline stage returns a [`WorkerError`]; the executor records
//! [`WorkerError::kind`] and the message on the failed job.

use thiserror::Error;
use vedit_media::MediaError;
use vedit_storage::UploadError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("Composition failed: {0}")]
    Composition(String),

    #[error("Upload session init failed: {0}")]
    SessionInit(String),

    #[error("Chunk transfer failed: {0}")]
    ChunkTransfer(String),

    #[error("Result lookup failed: {0}")]
    Lookup(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Queue error: {0}")]
    Queue(#[from] vedit_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Stable category recorded on failed jobs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Fetch(_) => "fetch",
            WorkerError::Segmentation(_) => "segmentation",
            WorkerError::InvalidInstruction(_) => "invalid_instruction",
            WorkerError::Composition(_) => "composition",
            WorkerError::SessionInit(_) => "session_init",
            WorkerError::ChunkTransfer(_) => "chunk_transfer",
            WorkerError::Lookup(_) => "lookup",
            WorkerError::Cancelled => "cancelled",
            WorkerError::Queue(_) => "queue",
            WorkerError::Io(_) => "io",
        }
    }

    /// Any failure to bring the source into the workspace is a fetch failure.
    pub fn fetch(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Fetch(other.to_string()),
        }
    }

    /// Errors raised while loading or scanning the source are segmentation
    /// failures, whatever the underlying cause.
    pub fn segmentation(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Segmentation(other.to_string()),
        }
    }

    /// Errors raised by the renderer are composition failures.
    pub fn composition(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Composition(other.to_string()),
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FetchFailed { .. } => WorkerError::Fetch(err.to_string()),
            MediaError::SegmentationFailed { .. } => WorkerError::Segmentation(err.to_string()),
            MediaError::InvalidInstruction { .. } => {
                WorkerError::InvalidInstruction(err.to_string())
            }
            MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Composition(other.to_string()),
        }
    }
}

impl From<UploadError> for WorkerError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Config(_) | UploadError::SessionInit(_) => {
                WorkerError::SessionInit(err.to_string())
            }
            UploadError::ChunkTransfer { .. } => WorkerError::ChunkTransfer(err.to_string()),
            UploadError::Lookup(_) => WorkerError::Lookup(err.to_string()),
            UploadError::Cancelled => WorkerError::Cancelled,
            UploadError::Io(e) => WorkerError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vedit_storage::ChunkFailureKind;

    #[test]
    fn test_media_errors_map_to_taxonomy() {
        let fetch: WorkerError = MediaError::fetch_failed("u", Some(404), "nope").into();
        assert_eq!(fetch.kind(), "fetch");

        let invalid: WorkerError = MediaError::invalid_instruction(0, "trim", "bad").into();
        assert_eq!(invalid.kind(), "invalid_instruction");

        let render: WorkerError = MediaError::ffmpeg_failed("boom", None, Some(1)).into();
        assert_eq!(render.kind(), "composition");

        let probe = WorkerError::segmentation(MediaError::InvalidVideo("x".into()));
        assert_eq!(probe.kind(), "segmentation");

        assert_eq!(WorkerError::composition(MediaError::Cancelled).kind(), "cancelled");
    }

    #[test]
    fn test_upload_errors_map_to_taxonomy() {
        let exhausted: WorkerError = UploadError::ChunkTransfer {
            kind: ChunkFailureKind::Exhausted,
            offset: 1024,
            attempts: 5,
            message: "503".into(),
        }
        .into();
        assert_eq!(exhausted.kind(), "chunk_transfer");
        assert!(exhausted.to_string().contains("offset 1024"));

        let init: WorkerError = UploadError::session_init("401").into();
        assert_eq!(init.kind(), "session_init");

        let lookup: WorkerError = UploadError::lookup("no link").into();
        assert_eq!(lookup.kind(), "lookup");
    }
}
