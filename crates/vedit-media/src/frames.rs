//! Sequential grayscale frame decoding.
//!
//! Scene segmentation only needs luminance, so frames are decoded by FFmpeg
//! straight into 8-bit gray (`-pix_fmt gray`) and read off a pipe one frame
//! at a time. Frames are downscaled to at most [`ANALYSIS_MAX_WIDTH`] pixels
//! wide first; SSIM on a thumbnail is enough to detect shot changes and keeps
//! the scan cheap on long 1080p sources.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::command::{check_ffmpeg, stderr_tail};
use crate::error::{MediaError, MediaResult};
use vedit_models::FrameSize;

/// Maximum width of frames handed to the similarity primitive.
pub const ANALYSIS_MAX_WIDTH: u32 = 320;

/// Single-channel 8-bit frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return Err(MediaError::InvalidVideo(format!(
                "frame buffer of {} bytes does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; (width as usize) * (height as usize)],
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }
}

/// A finite, non-restartable stream of frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<GrayFrame>>;
}

/// Frames held in memory. Used for synthetic sources.
#[derive(Debug, Default)]
pub struct MemoryFrameSource {
    frames: VecDeque<GrayFrame>,
}

impl MemoryFrameSource {
    pub fn new(frames: impl IntoIterator<Item = GrayFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<GrayFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Size frames are decoded at for analysis: width capped, aspect kept,
/// both dimensions even and non-zero.
pub fn analysis_size(source: FrameSize) -> FrameSize {
    if source.width == 0 || source.height == 0 {
        return FrameSize::new(2, 2);
    }
    let width = source.width.min(ANALYSIS_MAX_WIDTH);
    let height = (source.height as f64 * width as f64 / source.width as f64).round() as u32;
    FrameSize::new(even_at_least_two(width), even_at_least_two(height))
}

fn even_at_least_two(v: u32) -> u32 {
    (v - v % 2).max(2)
}

/// Reads raw gray frames from an FFmpeg pipe.
pub struct FfmpegFrameSource<R = ChildStdout> {
    reader: R,
    size: FrameSize,
    decoder: Option<Decoder>,
    frames_read: u64,
}

/// The decoding process behind a pipe. Killed on drop.
struct Decoder {
    child: Child,
    stderr: JoinHandle<Vec<u8>>,
}

impl Decoder {
    /// Reap the process once its output is exhausted.
    async fn finish(mut self, frames_read: u64) -> MediaResult<()> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| MediaError::segmentation_failed(frames_read, e.to_string()))?;
        let stderr = self.stderr.await.unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        Err(MediaError::segmentation_failed(
            frames_read,
            format!("decoder exited with {}: {}", status, stderr_tail(&stderr)),
        ))
    }
}

impl FfmpegFrameSource<ChildStdout> {
    /// Spawn a decoder for `path` whose source frames are `source_size`.
    pub fn spawn(path: impl AsRef<Path>, source_size: FrameSize) -> MediaResult<Self> {
        check_ffmpeg()?;

        let path = path.as_ref();
        let size = analysis_size(source_size);
        debug!(
            "Decoding {} for analysis at {}",
            path.display(),
            size
        );

        let mut command = Command::new("ffmpeg");
        command
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args([
                "-an",
                "-vf",
                &format!("scale={}:{}", size.width, size.height),
                "-pix_fmt",
                "gray",
                "-f",
                "rawvideo",
                "pipe:1",
            ]);
        Self::from_command(command, size)
    }

    /// Run `command` and read frames of `size` from its stdout.
    fn from_command(mut command: Command, size: FrameSize) -> MediaResult<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let reader = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::segmentation_failed(0, "decoder stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::segmentation_failed(0, "decoder stderr not captured"))?;
        let stderr = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        Ok(Self {
            reader,
            size,
            decoder: Some(Decoder { child, stderr }),
            frames_read: 0,
        })
    }
}

impl<R> FfmpegFrameSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Wrap an already-open raw gray stream of frames of `size`.
    pub fn from_reader(reader: R, size: FrameSize) -> Self {
        Self {
            reader,
            size,
            decoder: None,
            frames_read: 0,
        }
    }
}

#[async_trait]
impl<R> FrameSource for FfmpegFrameSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> MediaResult<Option<GrayFrame>> {
        let frame_len = (self.size.width as usize) * (self.size.height as usize);
        let mut buf = vec![0u8; frame_len];
        let mut filled = 0;

        while filled < frame_len {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .await
                .map_err(|e| MediaError::segmentation_failed(self.frames_read, e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < frame_len {
            // End of stream: a decoder that died mid-scan fails the scan.
            if let Some(decoder) = self.decoder.take() {
                decoder.finish(self.frames_read).await?;
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < frame_len {
            return Err(MediaError::segmentation_failed(
                self.frames_read,
                format!("truncated frame: {} of {} bytes", filled, frame_len),
            ));
        }

        self.frames_read += 1;
        Ok(Some(GrayFrame {
            width: self.size.width,
            height: self.size.height,
            data: buf,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_size() {
        assert_eq!(analysis_size(FrameSize::new(1920, 1080)), FrameSize::new(320, 180));
        assert_eq!(analysis_size(FrameSize::new(200, 100)), FrameSize::new(200, 100));
        assert_eq!(analysis_size(FrameSize::new(1080, 1920)), FrameSize::new(320, 568));
        assert_eq!(analysis_size(FrameSize::new(3, 1)), FrameSize::new(2, 2));
    }

    #[test]
    fn test_gray_frame_rejects_wrong_length() {
        assert!(GrayFrame::new(4, 4, vec![0; 15]).is_err());
        let frame = GrayFrame::new(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(frame.get(1, 1), 4);
    }

    #[tokio::test]
    async fn test_reader_source_splits_frames() {
        let bytes: Vec<u8> = (0..8).collect();
        let mut source = FfmpegFrameSource::from_reader(&bytes[..], FrameSize::new(2, 2));

        let first = source.next_frame().await.unwrap().unwrap();
        assert_eq!(first.data, vec![0, 1, 2, 3]);
        let second = source.next_frame().await.unwrap().unwrap();
        assert_eq!(second.data, vec![4, 5, 6, 7]);
        assert!(source.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_segmentation_error() {
        let bytes = [0u8; 6];
        let mut source = FfmpegFrameSource::from_reader(&bytes[..], FrameSize::new(2, 2));
        source.next_frame().await.unwrap();
        let err = source.next_frame().await.unwrap_err();
        assert!(matches!(err, MediaError::SegmentationFailed { frame: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_decoder_exit_status_fails_the_scan() {
        let mut command = Command::new("sh");
        command.args(["-c", "head -c 8 /dev/zero; echo 'corrupt packet' >&2; exit 1"]);
        let mut source = FfmpegFrameSource::from_command(command, FrameSize::new(2, 2)).unwrap();

        assert!(source.next_frame().await.unwrap().is_some());
        assert!(source.next_frame().await.unwrap().is_some());
        let err = source.next_frame().await.unwrap_err();
        match err {
            MediaError::SegmentationFailed { frame, message } => {
                assert_eq!(frame, 2);
                assert!(message.contains("corrupt packet"), "message was {}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_decoder_exit_ends_the_stream() {
        let mut command = Command::new("sh");
        command.args(["-c", "head -c 4 /dev/zero"]);
        let mut source = FfmpegFrameSource::from_command(command, FrameSize::new(2, 2)).unwrap();

        assert!(source.next_frame().await.unwrap().is_some());
        assert!(source.next_frame().await.unwrap().is_none());
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
