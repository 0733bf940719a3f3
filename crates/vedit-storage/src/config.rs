//! Upload configuration.

use std::time::Duration;

/// Chunk size for offset-addressed transfers (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Consecutive transient chunk failures tolerated before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Fixed wait between chunk retries.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Configuration for the hosting client and the chunked uploader.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Hosting API root, without trailing slash
    pub api_base: String,
    /// Bearer token for the hosting API
    pub access_token: String,
    pub chunk_size: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.vimeo.com".to_string(),
            access_token: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl UploadConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_base = std::env::var("HOSTING_API_BASE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.api_base);

        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: std::env::var("HOSTING_ACCESS_TOKEN").unwrap_or_default(),
            chunk_size: std::env::var("UPLOAD_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.chunk_size),
            max_retries: std::env::var("UPLOAD_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &u32| n > 0)
                .unwrap_or(defaults.max_retries),
            retry_backoff: std::env::var("UPLOAD_RETRY_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&secs: &f64| (0.0..=3600.0).contains(&secs))
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.retry_backoff),
            request_timeout: std::env::var("UPLOAD_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}
