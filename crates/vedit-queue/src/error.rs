//! Queue error types.

use thiserror::Error;
use vedit_models::InvalidTransition;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Queue is full")]
    Full,

    #[error("Queue is closed")]
    Closed,
}

impl QueueError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}
