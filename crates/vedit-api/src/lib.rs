//! Axum HTTP API for the video editing service.
//!
//! This crate provides:
//! - `POST /process_video` and `GET /status/:task_id`
//! - Per-client rate limiting on submissions
//! - Prometheus metrics and a liveness probe

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::{ApiConfig, ValidationMode};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
