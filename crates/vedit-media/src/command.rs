//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Keep at most this much of FFmpeg's stderr for error reports.
const STDERR_TAIL_BYTES: usize = 4096;

/// One `-i` input together with the options that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    pub args: Vec<String>,
    pub path: PathBuf,
}

impl FfmpegInput {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Loop a still image so it can be overlaid for any duration.
    pub fn looped_image(path: impl AsRef<Path>) -> Self {
        Self {
            args: vec!["-loop".to_string(), "1".to_string()],
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Append an input; its index is the number of inputs added before it.
    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add output arguments (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a filter graph label or stream specifier into the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set output frame rate.
    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with cancellation.
#[derive(Debug, Default, Clone)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill FFmpeg when the watched flag flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let status = match self.cancel_rx.clone() {
            Some(mut cancel_rx) => {
                tokio::select! {
                    status = child.wait() => status?,
                    _ = wait_for_cancel(&mut cancel_rx) => {
                        info!("FFmpeg cancelled, killing process");
                        let _ = child.kill().await;
                        return Err(MediaError::Cancelled);
                    }
                }
            }
            None => child.wait().await?,
        };

        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_tail(&stderr)),
                status.code(),
            ))
        }
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            // Sender gone: cancellation can no longer happen.
            std::future::pending::<()>().await;
        }
    }
}

pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
