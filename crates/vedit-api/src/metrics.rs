//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder. Worker and upload metrics recorded
/// through the `metrics` facade land in the same registry.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vedit_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vedit_http_request_duration_seconds";
    pub const JOBS_SUBMITTED_TOTAL: &str = "vedit_jobs_submitted_total";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vedit_rate_limit_hits_total";
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_rate_limit_hit(path: &str) {
    counter!(names::RATE_LIMIT_HITS_TOTAL, "path" => path.to_string()).increment(1);
}

/// Records every request, labelled by route template rather than raw path so
/// task IDs do not explode label cardinality.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
