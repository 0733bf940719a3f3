//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Parent of the per-job workspaces
    pub work_dir: PathBuf,
    /// Keep job workspaces after the job ends (debugging)
    pub keep_work_dir: bool,
    /// Output frame rate
    pub output_fps: u32,
    /// Grace period for in-flight jobs on shutdown before they are cancelled
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: PathBuf::from("/tmp/vedit"),
            keep_work_dir: false,
            output_fps: 30,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(2),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vedit")),
            keep_work_dir: std::env::var("WORKER_KEEP_WORK_DIR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            output_fps: std::env::var("WORKER_OUTPUT_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &u32| n > 0)
                .unwrap_or(30),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}
