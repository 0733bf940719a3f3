//! In-process dispatch queue.
//!
//! A bounded channel between the submission handler and the executor. The
//! sending half is cheap to clone; the receiving half belongs to the
//! executor, which closes it on shutdown so no further jobs are accepted
//! while already queued ones can still be drained.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{QueueError, QueueResult};
use crate::job::ProcessVideoJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs that may wait for a worker slot before submissions are refused
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            capacity: std::env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(64),
        }
    }
}

/// Sending half.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<ProcessVideoJob>,
}

/// Receiving half, owned by the executor.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<ProcessVideoJob>,
}

impl JobQueue {
    pub fn new(config: &QueueConfig) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        (Self { tx }, JobReceiver { rx })
    }

    /// Enqueue without waiting; fails when the queue is full or closed.
    pub fn enqueue(&self, job: ProcessVideoJob) -> QueueResult<()> {
        let job_id = job.job_id.clone();
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;
        debug!(job_id = %job_id, "Job enqueued");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl JobReceiver {
    /// Next job; `None` once closed and drained, or when every sender is gone.
    pub async fn recv(&mut self) -> Option<ProcessVideoJob> {
        self.rx.recv().await
    }

    /// Refuse further jobs; queued ones remain receivable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vedit_models::JobId;

    fn job() -> ProcessVideoJob {
        ProcessVideoJob::new(JobId::new(), "https://example.com/v.mp4", vec![])
    }

    #[tokio::test]
    async fn test_fifo_delivery() {
        let (queue, mut rx) = JobQueue::new(&QueueConfig::default());
        let first = job();
        let second = job();
        queue.enqueue(first.clone()).unwrap();
        queue.enqueue(second.clone()).unwrap();

        assert_eq!(rx.recv().await.unwrap().job_id, first.job_id);
        assert_eq!(rx.recv().await.unwrap().job_id, second.job_id);
    }

    #[tokio::test]
    async fn test_full_queue_refuses() {
        let (queue, _rx) = JobQueue::new(&QueueConfig { capacity: 1 });
        queue.enqueue(job()).unwrap();
        assert!(matches!(queue.enqueue(job()), Err(QueueError::Full)));
    }

    #[tokio::test]
    async fn test_close_drains_then_refuses() {
        let (queue, mut rx) = JobQueue::new(&QueueConfig::default());
        queue.enqueue(job()).unwrap();
        rx.close();

        assert!(matches!(queue.enqueue(job()), Err(QueueError::Closed)));
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_job_round_trips_as_json() {
        let original = job();
        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: ProcessVideoJob = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.job_id, original.job_id);
    }
}
