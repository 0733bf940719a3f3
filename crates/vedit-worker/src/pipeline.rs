//! The per-job processing pipeline.
//!
//! fetch -> segment -> apply instructions -> render -> upload, strictly in
//! that order. The job enters already `Processing` and leaves in exactly
//! one terminal status.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, Instrument};

use vedit_media::{
    scene_intervals, Composition, Fetcher, InstructionEngine, RenderOptions, SceneSegmenter,
    VideoEngine,
};
use vedit_models::JobStatus;
use vedit_queue::{JobTracker, ProcessVideoJob};
use vedit_storage::ResumableUploader;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics::{record_job_completed, record_job_failed};
use crate::workspace::JobWorkspace;

/// Everything a job needs, shared by all concurrently running jobs.
pub struct Pipeline {
    config: WorkerConfig,
    tracker: JobTracker,
    engine: Arc<dyn VideoEngine>,
    fetcher: Fetcher,
    segmenter: SceneSegmenter,
    instructions: InstructionEngine,
    uploader: ResumableUploader,
}

impl Pipeline {
    pub fn new(
        config: WorkerConfig,
        tracker: JobTracker,
        engine: Arc<dyn VideoEngine>,
        fetcher: Fetcher,
        uploader: ResumableUploader,
    ) -> Self {
        Self {
            segmenter: SceneSegmenter::new(Arc::clone(&engine)),
            instructions: InstructionEngine::new(Arc::clone(&engine), fetcher.clone()),
            config,
            tracker,
            engine,
            fetcher,
            uploader,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Run one job to a terminal status and return that status.
    ///
    /// The job must already be `Processing` (it is moved there on
    /// acceptance). Anything else is skipped and its current status
    /// returned unchanged.
    pub async fn run(&self, job: ProcessVideoJob, cancel: watch::Receiver<bool>) -> Option<JobStatus> {
        let logger = JobLogger::new(&job.job_id);
        let span = logger.create_span();
        self.run_logged(job, cancel, logger).instrument(span).await
    }

    async fn run_logged(
        &self,
        job: ProcessVideoJob,
        cancel: watch::Receiver<bool>,
        logger: JobLogger,
    ) -> Option<JobStatus> {
        match self.tracker.status(&job.job_id).await {
            Some(JobStatus::Processing) => {}
            other => {
                let status = other.map_or_else(|| "unknown".to_string(), |s| s.to_string());
                logger.log_warning("start", &format!("Not running job in status {}", status));
                return other;
            }
        }
        logger.log_start(&job.video_url, job.instructions.len());

        let outcome = match JobWorkspace::create(&self.config.work_dir, &job.job_id).await {
            Ok(workspace) => {
                let result = self.process(&job, &workspace, &logger, &cancel).await;
                if self.config.keep_work_dir {
                    debug!("Keeping workspace {}", workspace.dir().display());
                } else {
                    workspace.cleanup().await;
                }
                result
            }
            Err(e) => Err(e),
        };

        let recorded = match outcome {
            Ok(link) => {
                logger.log_completion(&link);
                record_job_completed(logger.elapsed_secs());
                self.tracker.complete(&job.job_id, link).await
            }
            Err(e) => {
                let kind = e.kind();
                let message = e.to_string();
                logger.log_failure(kind, &message);
                record_job_failed(kind, logger.elapsed_secs());
                self.tracker.fail(&job.job_id, kind, message).await
            }
        };
        if let Err(e) = recorded {
            logger.log_warning("finish", &format!("Failed to record outcome: {}", e));
        }

        self.tracker.status(&job.job_id).await
    }

    async fn process(
        &self,
        job: &ProcessVideoJob,
        workspace: &JobWorkspace,
        logger: &JobLogger,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<String> {
        check_cancel(cancel)?;
        logger.log_stage("fetch", &format!("Fetching {}", job.video_url));
        let input = workspace.input_path();
        let bytes = self
            .fetcher
            .fetch(&job.video_url, &input)
            .await
            .map_err(WorkerError::fetch)?;
        logger.log_stage("fetch", &format!("Fetched {} bytes", bytes));

        check_cancel(cancel)?;
        logger.log_stage("segment", "Detecting scene cuts");
        let source = self
            .engine
            .load_clip(&input)
            .await
            .map_err(WorkerError::segmentation)?;
        let scenes = self
            .segmenter
            .segment_clip(&source)
            .await
            .map_err(WorkerError::segmentation)?;
        let intervals = scene_intervals(&scenes, source.info.fps, source.duration());
        if intervals.is_empty() {
            logger.log_warning(
                "segment",
                "A single scene cut leaves no interval, using the whole source",
            );
        }
        let base = source.concat(&intervals);
        logger.log_stage(
            "segment",
            &format!(
                "{} cuts over {} frames, {} segments, {:.3}s",
                scenes.len(),
                scenes.frames_scanned,
                base.segments.len(),
                base.duration()
            ),
        );

        check_cancel(cancel)?;
        logger.log_stage(
            "instructions",
            &format!("Applying {} instructions", job.instructions.len()),
        );
        let composition = self
            .instructions
            .apply(Composition::new(base), &job.instructions, workspace.dir())
            .await?;

        check_cancel(cancel)?;
        logger.log_stage("render", "Rendering composition");
        let output = workspace.output_path();
        let options = RenderOptions {
            fps: self.config.output_fps,
            cancel: Some(cancel.clone()),
        };
        self.engine
            .render(&composition, &output, &options)
            .await
            .map_err(WorkerError::composition)?;

        check_cancel(cancel)?;
        logger.log_stage("upload", "Uploading rendered video");
        let uploaded = self.uploader.upload(&output, Some(cancel.clone())).await?;
        logger.log_stage(
            "upload",
            &format!("Uploaded {} bytes as {}", uploaded.size, uploaded.resource_id),
        );

        Ok(uploaded.link)
    }
}

fn check_cancel(cancel: &watch::Receiver<bool>) -> WorkerResult<()> {
    if *cancel.borrow() {
        return Err(WorkerError::Cancelled);
    }
    Ok(())
}
