//! HTTP request/response schemas.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{Instruction, Job, JobId};

/// `POST /process_video` body.
///
/// Both fields are optional at the serde level so a missing field produces a
/// domain error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProcessVideoRequest {
    #[validate(url)]
    #[serde(default)]
    pub video_url: Option<String>,

    #[serde(default)]
    pub processing_instructions: Option<Vec<Instruction>>,
}

impl ProcessVideoRequest {
    /// Both required fields, if present and non-empty.
    pub fn required_parts(&self) -> Option<(&str, &[Instruction])> {
        let url = self.video_url.as_deref().filter(|u| !u.trim().is_empty())?;
        let instructions = self
            .processing_instructions
            .as_deref()
            .filter(|list| !list.is_empty())?;
        Some((url, instructions))
    }
}

/// `202 Accepted` body for a submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoResponse {
    pub message: String,
    pub task_id: JobId,
}

/// `GET /status/:task_id` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub task_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub const NOT_FOUND: &'static str = "Not found";

    pub fn from_job(job: &Job) -> Self {
        Self {
            task_id: job.id.to_string(),
            status: job.status.to_string(),
            result_link: job.result_link.clone(),
            error: job.error_message.clone(),
        }
    }

    pub fn not_found(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: Self::NOT_FOUND.to_string(),
            result_link: None,
            error: None,
        }
    }
}
