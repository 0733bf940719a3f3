//! Job execution for the video editing service.
//!
//! This crate provides:
//! - [`Pipeline`], which runs one job through fetch, segmentation,
//!   instruction application, rendering and upload
//! - [`JobExecutor`], which bounds concurrency and handles graceful shutdown
//! - Per-job logging, metrics and scratch directories

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::Pipeline;
pub use workspace::JobWorkspace;
