//! Structured per-job logging.
//!
//! Every pipeline message carries the job ID and the current stage so log
//! lines from concurrent jobs can be told apart.

use std::time::Instant;
use tracing::{error, info, warn, Span};
use vedit_models::JobId;

/// Job logger that tracks elapsed time since the job was picked up.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
            started: Instant::now(),
        }
    }

    pub fn log_start(&self, video_url: &str, instructions: usize) {
        info!(
            job_id = %self.job_id,
            "Job started: {} ({} instructions)", video_url, instructions
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            stage,
            elapsed_ms = self.elapsed_ms(),
            "{}", message
        );
    }

    pub fn log_warning(&self, stage: &str, message: &str) {
        warn!(job_id = %self.job_id, stage, "{}", message);
    }

    pub fn log_failure(&self, kind: &str, message: &str) {
        error!(
            job_id = %self.job_id,
            kind,
            elapsed_ms = self.elapsed_ms(),
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, link: &str) {
        info!(
            job_id = %self.job_id,
            elapsed_ms = self.elapsed_ms(),
            "Job completed: {}", link
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Span the whole pipeline runs inside, so nested media and upload logs
    /// inherit the job ID.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }
}
