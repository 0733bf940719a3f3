//! Job submission and status handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{info, warn};
use validator::Validate;

use vedit_models::{
    Instruction, Job, JobId, ProcessVideoRequest, ProcessVideoResponse, StatusResponse,
};
use vedit_queue::ProcessVideoJob;

use crate::config::ValidationMode;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security;
use crate::state::AppState;

pub const MISSING_FIELDS: &str = "video_url and processing_instructions are required";

const ACCEPTED_MESSAGE: &str =
    "Video is being processed. You will receive a notification once it is ready.";

/// `POST /process_video`: register a job and hand it to the executor.
pub async fn process_video(
    State(state): State<AppState>,
    payload: Result<Json<ProcessVideoRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProcessVideoResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (video_url, instructions) = request
        .required_parts()
        .ok_or_else(|| ApiError::bad_request(MISSING_FIELDS))?;
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    security::check_submission_urls(video_url, instructions, state.config.allow_file_urls)
        .map_err(ApiError::validation)?;
    if state.config.validation == ValidationMode::Strict {
        check_strict(instructions)?;
    }

    // Accepted jobs are Processing before the 202 goes out; a refused
    // dispatch forgets the job again.
    let job_id = JobId::new();
    state
        .tracker
        .insert(Job::with_id(job_id.clone(), video_url))
        .await;
    let dispatched = match state.tracker.start(&job_id).await {
        Ok(()) => {
            let job = ProcessVideoJob::new(job_id.clone(), video_url, instructions.to_vec());
            state.queue.enqueue(job)
        }
        Err(e) => Err(e),
    };
    if let Err(e) = dispatched {
        warn!(job_id = %job_id, "Refusing job: {}", e);
        state.tracker.remove(&job_id).await;
        return Err(e.into());
    }

    metrics::record_job_submitted();
    info!(
        job_id = %job_id,
        instructions = instructions.len(),
        "Accepted job for {}", video_url
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessVideoResponse {
            message: ACCEPTED_MESSAGE.to_string(),
            task_id: job_id,
        }),
    ))
}

/// `GET /status/:task_id`.
pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> (StatusCode, Json<StatusResponse>) {
    match state.tracker.get(&JobId::from_string(task_id.as_str())).await {
        Some(job) => (StatusCode::OK, Json(StatusResponse::from_job(&job))),
        None => (StatusCode::NOT_FOUND, Json(StatusResponse::not_found(task_id))),
    }
}

fn check_strict(instructions: &[Instruction]) -> ApiResult<()> {
    let problems: Vec<String> = instructions
        .iter()
        .enumerate()
        .flat_map(|(index, instruction)| {
            instruction
                .strict_violations()
                .into_iter()
                .map(move |problem| format!("instruction #{}: {}", index, problem))
        })
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(problems.join("; ")))
    }
}
