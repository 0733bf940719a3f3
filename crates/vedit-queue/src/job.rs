//! Job payloads handed from the API to the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vedit_models::{Instruction, JobId};

/// Job to fetch, edit and upload one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Source video URL
    pub video_url: String,
    /// Instructions, applied in order
    pub instructions: Vec<Instruction>,
    /// When the job was accepted
    pub created_at: DateTime<Utc>,
}

impl ProcessVideoJob {
    pub fn new(job_id: JobId, video_url: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            job_id,
            video_url: video_url.into(),
            instructions,
            created_at: Utc::now(),
        }
    }
}
