//! End-to-end pipeline runs against a fake engine and mocked HTTP endpoints.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use vedit_media::{
    Clip, Composition, FetchConfig, Fetcher, FrameSource, GrayFrame, LayerKind, MediaError,
    MediaInfo, MediaResult, MemoryFrameSource, RenderOptions, VideoEngine,
};
use vedit_models::{FrameSize, Instruction, Job, JobId, JobStatus};
use vedit_queue::{JobQueue, JobTracker, ProcessVideoJob, QueueConfig};
use vedit_storage::{ResumableUploader, UploadConfig, VimeoAdapter};
use vedit_worker::{JobExecutor, Pipeline, WorkerConfig};

/// Ten-second 1000x1000 source with no scene cuts. Renders write a fixed
/// payload and remember the composition they were given.
#[derive(Default)]
struct FakeEngine {
    rendered: Mutex<Option<Composition>>,
    /// When set, renders wait for a notification (or cancellation).
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl VideoEngine for FakeEngine {
    async fn load_clip(&self, path: &Path) -> MediaResult<Clip> {
        Ok(Clip::from_source(
            path,
            MediaInfo {
                duration: 10.0,
                size: FrameSize::new(1000, 1000),
                fps: 30.0,
                has_audio: false,
            },
        ))
    }

    async fn audio_duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(30.0)
    }

    async fn open_frames(&self, _clip: &Clip) -> MediaResult<Box<dyn FrameSource>> {
        let frames = (0..10).map(|_| GrayFrame::filled(16, 16, 90));
        Ok(Box::new(MemoryFrameSource::new(frames)))
    }

    async fn render(
        &self,
        composition: &Composition,
        output: &Path,
        options: &RenderOptions,
    ) -> MediaResult<()> {
        if let Some(gate) = &self.gate {
            let mut cancel = options.cancel.clone().expect("pipeline passes a cancel token");
            tokio::select! {
                _ = gate.notified() => {}
                _ = cancel.wait_for(|c| *c) => return Err(MediaError::Cancelled),
            }
        }
        *self.rendered.lock().unwrap() = Some(composition.clone());
        tokio::fs::write(output, vec![7u8; 3000]).await?;
        Ok(())
    }
}

/// Acknowledges every chunk in full.
struct Acknowledge;

impl Respond for Acknowledge {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset: u64 = request
            .headers
            .get("upload-offset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap();
        let next = offset + request.body.len() as u64;
        ResponseTemplate::new(204).insert_header("Upload-Offset", next.to_string().as_str())
    }
}

async fn mock_endpoints() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/source.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4096]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/me/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "/videos/42",
            "upload": {"upload_link": format!("{}/upload/42", server.uri())}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/upload/42"))
        .respond_with(Acknowledge)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"link": "https://vimeo.com/42"})),
        )
        .mount(&server)
        .await;
    server
}

fn pipeline(
    server: &MockServer,
    engine: Arc<FakeEngine>,
    work_dir: &Path,
    tracker: JobTracker,
) -> Pipeline {
    let upload = UploadConfig {
        api_base: server.uri(),
        access_token: "token".into(),
        chunk_size: 1024,
        max_retries: 2,
        retry_backoff: Duration::from_millis(5),
        ..UploadConfig::default()
    };
    let uploader =
        ResumableUploader::new(Arc::new(VimeoAdapter::new(&upload).unwrap()), &upload);
    let config = WorkerConfig {
        work_dir: work_dir.to_path_buf(),
        shutdown_timeout: Duration::from_millis(100),
        ..WorkerConfig::default()
    };
    Pipeline::new(
        config,
        tracker,
        engine,
        Fetcher::new(FetchConfig::default()).unwrap(),
        uploader,
    )
}

fn instructions(value: serde_json::Value) -> Vec<Instruction> {
    serde_json::from_value(value).unwrap()
}

/// Register and accept a job the way the submission handler does.
async fn submit(tracker: &JobTracker, url: String, instructions: Vec<Instruction>) -> ProcessVideoJob {
    let id = JobId::new();
    tracker.insert(Job::with_id(id.clone(), url.clone())).await;
    tracker.start(&id).await.unwrap();
    ProcessVideoJob::new(id, url, instructions)
}

async fn wait_for_status(tracker: &JobTracker, id: &JobId, wanted: JobStatus) {
    for _ in 0..500 {
        if tracker.status(id).await == Some(wanted) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached {}", wanted);
}

fn no_cancel() -> tokio::sync::watch::Receiver<bool> {
    tokio::sync::watch::channel(false).1
}

#[tokio::test]
async fn test_trim_and_text_job_completes() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let engine = Arc::new(FakeEngine::default());
    let pipeline = pipeline(&server, Arc::clone(&engine), work_dir.path(), tracker.clone());

    let job = submit(
        &tracker,
        format!("{}/source.mp4", server.uri()),
        instructions(json!([
            {"action": "trim", "start": 0, "end": 5},
            {"action": "add_text", "text": "Hi", "position": "top_left"}
        ])),
    )
    .await;
    let id = job.job_id.clone();

    let status = pipeline.run(job, no_cancel()).await;
    assert_eq!(status, Some(JobStatus::Completed));

    let stored = tracker.get(&id).await.unwrap();
    assert_eq!(stored.result_link.as_deref(), Some("https://vimeo.com/42"));
    assert!(stored.error_kind.is_none());

    let rendered = engine.rendered.lock().unwrap().clone().unwrap();
    assert!((rendered.duration() - 5.0).abs() < 1e-6);
    assert_eq!(rendered.layers.len(), 1);
    match &rendered.layers[0].kind {
        LayerKind::Text(text) => {
            assert_eq!(text.text, "Hi");
            assert_eq!((text.x, text.y), (20, 20));
        }
        other => panic!("unexpected layer {:?}", other),
    }

    assert!(!work_dir.path().join(id.as_str()).exists());
}

#[tokio::test]
async fn test_missing_source_fails_with_fetch_kind() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let engine = Arc::new(FakeEngine::default());
    let pipeline = pipeline(&server, Arc::clone(&engine), work_dir.path(), tracker.clone());

    let job = submit(&tracker, format!("{}/missing.mp4", server.uri()), vec![]).await;
    let id = job.job_id.clone();

    assert_eq!(pipeline.run(job, no_cancel()).await, Some(JobStatus::Failed));
    let stored = tracker.get(&id).await.unwrap();
    assert_eq!(stored.error_kind.as_deref(), Some("fetch"));
    assert!(stored.result_link.is_none());
    assert!(engine.rendered.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_out_of_range_trim_fails_with_instruction_kind() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let pipeline = pipeline(
        &server,
        Arc::new(FakeEngine::default()),
        work_dir.path(),
        tracker.clone(),
    );

    let job = submit(
        &tracker,
        format!("{}/source.mp4", server.uri()),
        instructions(json!([{"action": "trim", "start": 8, "end": 20}])),
    )
    .await;
    let id = job.job_id.clone();

    assert_eq!(pipeline.run(job, no_cancel()).await, Some(JobStatus::Failed));
    let stored = tracker.get(&id).await.unwrap();
    assert_eq!(stored.error_kind.as_deref(), Some("invalid_instruction"));
}

#[tokio::test]
async fn test_job_stays_processing_until_render_finishes() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(FakeEngine {
        gate: Some(Arc::clone(&gate)),
        ..FakeEngine::default()
    });
    let pipeline = Arc::new(pipeline(&server, engine, work_dir.path(), tracker.clone()));

    let job = submit(&tracker, format!("{}/source.mp4", server.uri()), vec![]).await;
    let id = job.job_id.clone();

    let running = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.run(job, no_cancel()).await })
    };
    // Let the job reach the gated render.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tracker.status(&id).await, Some(JobStatus::Processing));
    assert!(!running.is_finished());

    gate.notify_one();
    assert_eq!(running.await.unwrap(), Some(JobStatus::Completed));
}

#[tokio::test]
async fn test_jobs_not_accepted_are_skipped() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let engine = Arc::new(FakeEngine::default());
    let pipeline = pipeline(&server, Arc::clone(&engine), work_dir.path(), tracker.clone());

    let url = format!("{}/source.mp4", server.uri());
    let id = JobId::new();
    tracker.insert(Job::with_id(id.clone(), url.clone())).await;
    let job = ProcessVideoJob::new(id.clone(), url.clone(), vec![]);
    assert_eq!(pipeline.run(job, no_cancel()).await, Some(JobStatus::Queued));

    let unknown = ProcessVideoJob::new(JobId::new(), url, vec![]);
    assert_eq!(pipeline.run(unknown, no_cancel()).await, None);

    assert!(engine.rendered.lock().unwrap().is_none());
    assert_eq!(tracker.status(&id).await, Some(JobStatus::Queued));
}

#[tokio::test]
async fn test_executor_runs_queued_jobs() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let executor = Arc::new(JobExecutor::new(
        WorkerConfig::default(),
        pipeline(
            &server,
            Arc::new(FakeEngine::default()),
            work_dir.path(),
            tracker.clone(),
        ),
    ));
    let (queue, receiver) = JobQueue::new(&QueueConfig::default());

    let running = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver).await })
    };

    let first = submit(&tracker, format!("{}/source.mp4", server.uri()), vec![]).await;
    let second = submit(&tracker, format!("{}/missing.mp4", server.uri()), vec![]).await;
    let (first_id, second_id) = (first.job_id.clone(), second.job_id.clone());
    queue.enqueue(first).unwrap();
    queue.enqueue(second).unwrap();

    wait_for_status(&tracker, &first_id, JobStatus::Completed).await;
    wait_for_status(&tracker, &second_id, JobStatus::Failed).await;

    executor.shutdown();
    running.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_cancels_stuck_jobs() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let engine = Arc::new(FakeEngine {
        gate: Some(Arc::new(Notify::new())),
        ..FakeEngine::default()
    });
    let executor = Arc::new(JobExecutor::new(
        WorkerConfig {
            shutdown_timeout: Duration::from_millis(50),
            ..WorkerConfig::default()
        },
        pipeline(&server, engine, work_dir.path(), tracker.clone()),
    ));
    let (queue, receiver) = JobQueue::new(&QueueConfig::default());

    let running = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver).await })
    };

    let job = submit(&tracker, format!("{}/source.mp4", server.uri()), vec![]).await;
    let id = job.job_id.clone();
    queue.enqueue(job).unwrap();
    wait_for_status(&tracker, &id, JobStatus::Processing).await;

    executor.shutdown();
    running.await.unwrap();

    let stored = tracker.get(&id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_kind.as_deref(), Some("cancelled"));
    assert!(queue.is_closed());
}

#[tokio::test]
async fn test_shutdown_fails_jobs_still_waiting_for_a_slot() {
    let server = mock_endpoints().await;
    let work_dir = tempfile::tempdir().unwrap();
    let tracker = JobTracker::new();
    let engine = Arc::new(FakeEngine {
        gate: Some(Arc::new(Notify::new())),
        ..FakeEngine::default()
    });
    let executor = Arc::new(JobExecutor::new(
        WorkerConfig {
            max_concurrent_jobs: 1,
            shutdown_timeout: Duration::from_millis(50),
            ..WorkerConfig::default()
        },
        pipeline(&server, engine, work_dir.path(), tracker.clone()),
    ));
    let (queue, receiver) = JobQueue::new(&QueueConfig::default());

    let running = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver).await })
    };

    let url = format!("{}/source.mp4", server.uri());
    let busy = submit(&tracker, url.clone(), vec![]).await;
    let waiting = submit(&tracker, url, vec![]).await;
    let (busy_id, waiting_id) = (busy.job_id.clone(), waiting.job_id.clone());
    queue.enqueue(busy).unwrap();
    queue.enqueue(waiting).unwrap();
    // The only slot is held by the gated job.
    tokio::time::sleep(Duration::from_millis(100)).await;

    executor.shutdown();
    running.await.unwrap();

    for id in [&busy_id, &waiting_id] {
        let stored = tracker.get(id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error_kind.as_deref(), Some("cancelled"));
    }
}
