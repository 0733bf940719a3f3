//! Health check handler.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    /// Tracked jobs per status
    pub jobs: BTreeMap<String, usize>,
}

/// Liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let jobs = state
        .tracker
        .counts()
        .await
        .into_iter()
        .map(|(status, count)| (status.to_string(), count))
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        jobs,
    })
}
