//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use vedit_models::FrameSize;

/// Media file information.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Frame size of the first video stream (0x0 for audio-only files)
    pub size: FrameSize,
    /// Frame rate (fps)
    pub fps: f64,
    /// Whether an audio stream is present
    pub has_audio: bool,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    Ok(media_info_from_probe(&probe))
}

/// Probe a file that must contain a video stream.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();
    let info = probe_media(path).await?;
    if info.size.width == 0 || info.size.height == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "No video stream found in {}",
            path.display()
        )));
    }
    Ok(info)
}

fn media_info_from_probe(probe: &FfprobeOutput) -> MediaInfo {
    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");

    // Container duration first, then whichever stream reports one.
    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| video.and_then(|s| s.duration.as_deref()?.parse().ok()))
        .or_else(|| audio.and_then(|s| s.duration.as_deref()?.parse().ok()))
        .unwrap_or(0.0);

    let fps = video
        .and_then(|s| s.avg_frame_rate.as_deref().or(s.r_frame_rate.as_deref()))
        .and_then(parse_frame_rate)
        .unwrap_or(30.0);

    MediaInfo {
        duration,
        size: FrameSize::new(
            video.and_then(|s| s.width).unwrap_or(0),
            video.and_then(|s| s.height).unwrap_or(0),
        ),
        fps,
        has_audio: audio.is_some(),
    }
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_media_info_from_probe_json() {
        let probe: FfprobeOutput = serde_json::from_str(
            r#"{
                "format": {"duration": "12.500000"},
                "streams": [
                    {"codec_type": "video", "width": 1920, "height": 1080, "avg_frame_rate": "25/1"},
                    {"codec_type": "audio"}
                ]
            }"#,
        )
        .unwrap();

        let info = media_info_from_probe(&probe);
        assert_eq!(info.size, FrameSize::new(1920, 1080));
        assert!((info.duration - 12.5).abs() < 1e-9);
        assert!((info.fps - 25.0).abs() < 1e-9);
        assert!(info.has_audio);
    }

    #[test]
    fn test_audio_only_probe() {
        let probe: FfprobeOutput = serde_json::from_str(
            r#"{"format": {}, "streams": [{"codec_type": "audio", "duration": "3.2"}]}"#,
        )
        .unwrap();

        let info = media_info_from_probe(&probe);
        assert_eq!(info.size, FrameSize::new(0, 0));
        assert!((info.duration - 3.2).abs() < 1e-9);
    }
}
