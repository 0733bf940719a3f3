//! Job tracker.
//!
//! Lifecycle-scoped map from job ID to job state. Created once at startup and
//! handed to both the submission handler and the executor; cloning shares
//! the same map. Every access goes through one `RwLock`, so readers never
//! observe a half-applied transition.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{QueueError, QueueResult};
use vedit_models::{Job, JobId, JobStatus};

#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted job.
    pub async fn insert(&self, job: Job) {
        debug!(job_id = %job.id, "Tracking job");
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// Forget a job that was never dispatched.
    pub async fn remove(&self, id: &JobId) -> Option<Job> {
        self.jobs.write().await.remove(id)
    }

    /// Snapshot of a job.
    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.jobs.read().await.get(id).map(|job| job.status)
    }

    /// Queued -> Processing.
    pub async fn start(&self, id: &JobId) -> QueueResult<()> {
        self.update(id, |job| job.start()).await
    }

    /// Processing -> Completed.
    pub async fn complete(&self, id: &JobId, result_link: impl Into<String>) -> QueueResult<()> {
        let link = result_link.into();
        self.update(id, move |job| job.complete(link)).await
    }

    /// Processing -> Failed.
    pub async fn fail(
        &self,
        id: &JobId,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> QueueResult<()> {
        let (kind, message) = (kind.into(), message.into());
        self.update(id, move |job| job.fail(kind, message)).await
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Number of jobs currently in each status.
    pub async fn counts(&self) -> HashMap<JobStatus, usize> {
        let mut counts = HashMap::new();
        for job in self.jobs.read().await.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }

    async fn update<F>(&self, id: &JobId, apply: F) -> QueueResult<()>
    where
        F: FnOnce(&mut Job) -> Result<(), vedit_models::InvalidTransition>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::not_found(id.as_str()))?;
        apply(job)?;
        debug!(job_id = %id, status = %job.status, "Job status changed");
        Ok(())
    }
}
