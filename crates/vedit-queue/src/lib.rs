//! In-process job bookkeeping.
//!
//! This crate provides:
//! - [`JobTracker`], the shared job-state store read by status queries
//! - [`JobQueue`], the bounded channel from submission to execution

pub mod error;
pub mod job;
pub mod queue;
pub mod tracker;

pub use error::{QueueError, QueueResult};
pub use job::ProcessVideoJob;
pub use queue::{JobQueue, JobReceiver, QueueConfig};
pub use tracker::JobTracker;
