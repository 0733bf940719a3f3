//! Submitted URL checks.
//!
//! Every URL a job will fetch (the source video, logos, background audio)
//! must be `http` or `https`. `file://` is accepted only when the operator
//! sets `ALLOW_FILE_URLS`, since the worker would otherwise read arbitrary
//! host files on behalf of an unauthenticated caller.

use tracing::warn;
use url::Url;

use vedit_models::Instruction;

/// Maximum URL length accepted in a submission.
const MAX_URL_LENGTH: usize = 2048;

/// Result of URL validation.
#[derive(Debug, PartialEq, Eq)]
pub enum UrlValidationResult {
    Valid,
    /// Malformed or uses an unsupported scheme.
    Invalid(String),
    TooLong,
}

impl UrlValidationResult {
    pub fn into_result(self) -> Result<(), String> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(msg) => Err(msg),
            Self::TooLong => Err(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )),
        }
    }
}

/// Validate one asset URL.
pub fn validate_asset_url(url: &str, allow_file_urls: bool) -> UrlValidationResult {
    if url.len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    let parsed = match Url::parse(url.trim()) {
        Ok(u) => u,
        Err(e) => return UrlValidationResult::Invalid(format!("Invalid URL format: {}", e)),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        "file" if allow_file_urls => return UrlValidationResult::Valid,
        scheme => {
            warn!(url = %url, "Rejected URL scheme");
            return UrlValidationResult::Invalid(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ));
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return UrlValidationResult::Invalid("URL must have a valid host".to_string());
    }

    UrlValidationResult::Valid
}

/// Validate the source URL and every URL named by an instruction.
///
/// Problems are reported per field, e.g. `instruction #2 logo_url: ...`.
pub fn check_submission_urls(
    video_url: &str,
    instructions: &[Instruction],
    allow_file_urls: bool,
) -> Result<(), String> {
    let mut problems = Vec::new();
    if let Err(e) = validate_asset_url(video_url, allow_file_urls).into_result() {
        problems.push(format!("video_url: {}", e));
    }

    for (index, instruction) in instructions.iter().enumerate() {
        let named = match instruction {
            Instruction::AddLogo(logo) => Some(("logo_url", logo.logo_url.as_str())),
            Instruction::AddBackgroundAudio(audio) => Some(("audio_url", audio.audio_url.as_str())),
            _ => None,
        };
        if let Some((field, url)) = named {
            if let Err(e) = validate_asset_url(url, allow_file_urls).into_result() {
                problems.push(format!("instruction #{} {}: {}", index, field, e));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_urls_are_valid() {
        assert_eq!(
            validate_asset_url("https://cdn.example.com/v.mp4", false),
            UrlValidationResult::Valid
        );
        assert_eq!(
            validate_asset_url("http://example.com/logo.png", false),
            UrlValidationResult::Valid
        );
    }

    #[test]
    fn test_file_urls_need_opt_in() {
        assert!(matches!(
            validate_asset_url("file:///etc/passwd", false),
            UrlValidationResult::Invalid(_)
        ));
        assert_eq!(
            validate_asset_url("file:///tmp/clip.mp4", true),
            UrlValidationResult::Valid
        );
    }

    #[test]
    fn test_other_schemes_and_garbage_are_invalid() {
        for url in ["ftp://example.com/v.mp4", "gopher://x", "not a url", "https://"] {
            assert!(
                matches!(validate_asset_url(url, true), UrlValidationResult::Invalid(_)),
                "{} was accepted",
                url
            );
        }
    }

    #[test]
    fn test_too_long() {
        let url = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert_eq!(validate_asset_url(&url, false), UrlValidationResult::TooLong);
    }

    #[test]
    fn test_submission_reports_each_field() {
        let instructions: Vec<Instruction> = serde_json::from_value(serde_json::json!([
            {"action": "trim", "start": 0, "end": 1},
            {"action": "add_logo", "logo_url": "file:///root/.ssh/id_rsa"},
            {"action": "add_background_audio", "audio_url": "https://example.com/a.mp3"}
        ]))
        .unwrap();

        let err = check_submission_urls("file:///etc/passwd", &instructions, false).unwrap_err();
        assert!(err.contains("video_url"));
        assert!(err.contains("instruction #1 logo_url"));
        assert!(!err.contains("audio_url"));

        assert!(check_submission_urls("https://example.com/v.mp4", &instructions, true).is_ok());
    }
}
