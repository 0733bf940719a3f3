//! Video editing service binary: HTTP API plus the in-process job executor.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vedit_api::{create_router, metrics, ApiConfig, AppState};
use vedit_media::{check_ffmpeg, check_ffprobe, FetchConfig, Fetcher, FfmpegEngine, VideoEngine};
use vedit_queue::{JobQueue, JobTracker, QueueConfig};
use vedit_storage::{ResumableUploader, UploadConfig, VimeoAdapter};
use vedit_worker::{JobExecutor, Pipeline, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting vedit-api");

    for check in [check_ffmpeg, check_ffprobe] {
        if let Err(e) = check() {
            error!("{}", e);
            std::process::exit(1);
        }
    }

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let upload_config = UploadConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    info!("Worker config: {:?}", worker_config);

    let tracker = JobTracker::new();
    let (queue, receiver) = JobQueue::new(&QueueConfig::from_env());

    let engine: Arc<dyn VideoEngine> = Arc::new(FfmpegEngine);
    let fetcher = Fetcher::new(FetchConfig::from_env())?;
    let adapter = Arc::new(VimeoAdapter::new(&upload_config)?);
    let uploader = ResumableUploader::new(adapter, &upload_config);
    let pipeline = Pipeline::new(
        worker_config.clone(),
        tracker.clone(),
        engine,
        fetcher,
        uploader,
    );

    let executor = Arc::new(JobExecutor::new(worker_config, pipeline));
    let executor_task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver).await })
    };

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = create_router(AppState::new(config, tracker, queue), metrics_handle);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    executor.shutdown();
    executor_task.await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vedit=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
