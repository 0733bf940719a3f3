//! Application state.

use vedit_queue::{JobQueue, JobTracker};

use crate::config::ApiConfig;

/// Shared application state.
///
/// The tracker is the same instance the executor's pipeline writes to.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub tracker: JobTracker,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(config: ApiConfig, tracker: JobTracker, queue: JobQueue) -> Self {
        Self {
            config,
            tracker,
            queue,
        }
    }
}
