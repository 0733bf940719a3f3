//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use vedit_queue::{JobReceiver, ProcessVideoJob};

use crate::config::WorkerConfig;
use crate::pipeline::Pipeline;

/// How long cancelled jobs get to reach a stage boundary before they are
/// aborted outright.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Pulls jobs off the dispatch channel and runs each as its own task, at
/// most `max_concurrent_jobs` at a time.
pub struct JobExecutor {
    config: WorkerConfig,
    pipeline: Arc<Pipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    cancel: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, pipeline: Pipeline) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);
        let (cancel, _) = watch::channel(false);
        Self {
            config,
            pipeline: Arc::new(pipeline),
            job_semaphore,
            shutdown,
            cancel,
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called or every sender of
    /// the dispatch channel is gone.
    ///
    /// On shutdown the channel is closed, jobs still waiting in it are
    /// failed as `cancelled`, and in-flight jobs get `shutdown_timeout` to
    /// finish before they are cancelled.
    pub async fn run(&self, mut receiver: JobReceiver) {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut tasks = JoinSet::new();

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {}
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_joined(joined),
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {}
                        job = receiver.recv() => match job {
                            Some(job) => self.spawn_job(&mut tasks, job, permit),
                            None => {
                                info!("Dispatch channel closed, stopping executor");
                                break;
                            }
                        },
                    }
                }
            }
        }

        receiver.close();
        let mut discarded = 0usize;
        while let Some(job) = receiver.recv().await {
            debug!(job_id = %job.job_id, "Discarding queued job");
            let failed = self
                .pipeline
                .tracker()
                .fail(&job.job_id, "cancelled", "Service shut down before the job started")
                .await;
            if let Err(e) = failed {
                warn!(job_id = %job.job_id, "Failed to record discarded job: {}", e);
            }
            discarded += 1;
        }
        if discarded > 0 {
            warn!("Discarded {} queued jobs that never started", discarded);
        }

        self.wait_for_jobs(&mut tasks).await;
        info!("Job executor stopped");
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    fn spawn_job(
        &self,
        tasks: &mut JoinSet<()>,
        job: ProcessVideoJob,
        permit: OwnedSemaphorePermit,
    ) {
        let pipeline = Arc::clone(&self.pipeline);
        let cancel = self.cancel.subscribe();
        debug!(job_id = %job.job_id, "Dispatching job");
        tasks.spawn(async move {
            let _permit = permit;
            pipeline.run(job, cancel).await;
        });
    }

    async fn wait_for_jobs(&self, tasks: &mut JoinSet<()>) {
        if tasks.is_empty() {
            return;
        }
        info!(
            "Waiting up to {:?} for {} in-flight jobs",
            self.config.shutdown_timeout,
            tasks.len()
        );
        if tokio::time::timeout(self.config.shutdown_timeout, drain(tasks))
            .await
            .is_ok()
        {
            return;
        }

        warn!("Cancelling {} in-flight jobs", tasks.len());
        self.cancel.send_replace(true);
        if tokio::time::timeout(CANCEL_GRACE, drain(tasks)).await.is_err() {
            error!("Aborting {} jobs that ignored cancellation", tasks.len());
            tasks.abort_all();
            drain(tasks).await;
        }
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        log_joined(joined);
    }
}

fn log_joined(joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("Job task aborted"),
        Err(e) => error!("Job task panicked: {}", e),
    }
}
