//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching, analysing or rendering media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Fetch of {url} failed: {message}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Scene segmentation failed at frame {frame}: {message}")]
    SegmentationFailed { frame: u64, message: String },

    #[error("Invalid instruction #{index} ({action}): {message}")]
    InvalidInstruction {
        index: usize,
        action: &'static str,
        message: String,
    },

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid media file: {0}")]
    InvalidVideo(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MediaError {
    pub fn fetch_failed(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    pub fn segmentation_failed(frame: u64, message: impl Into<String>) -> Self {
        Self::SegmentationFailed {
            frame,
            message: message.into(),
        }
    }

    pub fn invalid_instruction(index: usize, action: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInstruction {
            index,
            action,
            message: message.into(),
        }
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, MediaError::FetchFailed { .. })
    }

    pub fn is_invalid_instruction(&self) -> bool {
        matches!(self, MediaError::InvalidInstruction { .. })
    }
}
