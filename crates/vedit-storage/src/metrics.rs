//! Upload metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Chunk sends that failed transiently and were retried or exhausted.
    pub const CHUNK_RETRIES_TOTAL: &str = "vedit_upload_chunk_retries_total";

    /// Wall time of whole uploads in seconds, by outcome.
    pub const UPLOAD_DURATION_SECONDS: &str = "vedit_upload_duration_seconds";
}

/// Record one transient chunk failure.
pub fn record_chunk_retry() {
    counter!(names::CHUNK_RETRIES_TOTAL).increment(1);
}

/// Record a finished upload attempt.
pub fn record_upload(outcome: &'static str, seconds: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS, "outcome" => outcome).record(seconds);
}
