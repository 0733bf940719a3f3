//! Upload of finished videos to the hosting service.
//!
//! This crate provides:
//! - A [`HostingAdapter`] seam describing the three upload requests
//! - [`VimeoAdapter`], the tus-based implementation
//! - [`ResumableUploader`], which sequences session init, chunk transfer
//!   with bounded fixed-backoff retries, and the final link lookup

pub mod adapter;
pub mod config;
pub mod error;
pub mod metrics;
pub mod uploader;

pub use adapter::{HostingAdapter, SessionTarget, VimeoAdapter};
pub use config::UploadConfig;
pub use error::{ChunkFailure, ChunkFailureKind, UploadError, UploadResult};
pub use uploader::{ResumableUploader, UploadSession, UploadedVideo};
