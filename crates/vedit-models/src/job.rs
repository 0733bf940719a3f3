//! Job definitions and the status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
///
/// Transitions are monotonic: `Queued -> Processing -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobStatus {
    /// Accepted, waiting for a worker slot
    #[default]
    Queued,
    /// Pipeline is running
    Processing,
    /// Uploaded, result link available
    Completed,
    /// Terminated by an error
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One asynchronous unit of work from submission to terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Source video URL
    pub video_url: String,

    /// Current status
    pub status: JobStatus,

    /// Public link of the uploaded result (Completed only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_link: Option<String>,

    /// Error category (Failed only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Error detail (Failed only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(video_url: impl Into<String>) -> Self {
        Self::with_id(JobId::new(), video_url)
    }

    /// Create a new queued job with a caller-chosen ID.
    pub fn with_id(id: JobId, video_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            video_url: video_url.into(),
            status: JobStatus::Queued,
            result_link: None,
            error_kind: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Queued -> Processing.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(self.updated_at);
        Ok(())
    }

    /// Processing -> Completed, recording the public link.
    pub fn complete(&mut self, result_link: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Completed)?;
        self.result_link = Some(result_link.into());
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    /// Processing -> Failed, recording the error.
    pub fn fail(
        &mut self,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.error_kind = Some(kind.into());
        self.error_message = Some(message.into());
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
