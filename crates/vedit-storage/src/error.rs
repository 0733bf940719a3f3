//! Upload error types.

use std::fmt;
use thiserror::Error;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Why chunk transfer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFailureKind {
    /// The retry ceiling was reached on transient failures
    Exhausted,
    /// The upload target no longer exists
    Gone,
}

impl fmt::Display for ChunkFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkFailureKind::Exhausted => f.write_str("retries exhausted"),
            ChunkFailureKind::Gone => f.write_str("upload target gone"),
        }
    }
}

/// Errors that end an upload attempt.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to configure upload client: {0}")]
    Config(String),

    #[error("Upload session could not be created: {0}")]
    SessionInit(String),

    #[error("Chunk transfer failed at offset {offset} after {attempts} attempts ({kind}): {message}")]
    ChunkTransfer {
        kind: ChunkFailureKind,
        offset: u64,
        attempts: u32,
        message: String,
    },

    #[error("Lookup of the uploaded video failed: {0}")]
    Lookup(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn session_init(msg: impl Into<String>) -> Self {
        Self::SessionInit(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Whether a fresh upload attempt could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::ChunkTransfer {
                kind: ChunkFailureKind::Exhausted,
                ..
            }
        )
    }
}

/// Outcome of one failed chunk send, as reported by a hosting adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFailure {
    /// Resource-gone response; never retried.
    Gone { status: u16 },
    /// Anything else; retried up to the ceiling.
    Transient(String),
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkFailure::Gone { status } => write!(f, "remote responded {}", status),
            ChunkFailure::Transient(msg) => f.write_str(msg),
        }
    }
}
