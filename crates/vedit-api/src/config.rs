//! API configuration.

use std::str::FromStr;

/// How submissions with unrecognised instruction content are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Unknown actions are no-ops and unknown positions resolve to the origin.
    #[default]
    Lenient,
    /// Such submissions are rejected with 400 before a job is created.
    Strict,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(ValidationMode::Lenient),
            "strict" => Ok(ValidationMode::Strict),
            other => Err(format!("unknown validation mode '{}'", other)),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-client submissions per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    pub validation: ValidationMode,
    /// Accept `file://` asset URLs (local testing only)
    pub allow_file_urls: bool,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 1024 * 1024,
            validation: ValidationMode::Lenient,
            allow_file_urls: false,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024),
            validation: std::env::var("INSTRUCTION_VALIDATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            allow_file_urls: std::env::var("ALLOW_FILE_URLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}
