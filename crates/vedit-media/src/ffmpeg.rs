//! [`VideoEngine`] backed by the FFmpeg and FFprobe CLIs.

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::command::FfmpegRunner;
use crate::composition::Composition;
use crate::engine::{RenderOptions, VideoEngine};
use crate::error::{MediaError, MediaResult};
use crate::frames::{FfmpegFrameSource, FrameSource};
use crate::probe::{probe_media, probe_video};
use crate::render::plan_render;
use crate::timeline::Clip;

#[derive(Debug, Default, Clone)]
pub struct FfmpegEngine;

impl FfmpegEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VideoEngine for FfmpegEngine {
    async fn load_clip(&self, path: &Path) -> MediaResult<Clip> {
        let info = probe_video(path).await?;
        Ok(Clip::from_source(path, info))
    }

    async fn audio_duration(&self, path: &Path) -> MediaResult<f64> {
        let info = probe_media(path).await?;
        if !info.has_audio || info.duration <= 0.0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} has no audio stream",
                path.display()
            )));
        }
        Ok(info.duration)
    }

    async fn open_frames(&self, clip: &Clip) -> MediaResult<Box<dyn FrameSource>> {
        let source = FfmpegFrameSource::spawn(&clip.source, clip.info.size)?;
        Ok(Box::new(source))
    }

    async fn render(
        &self,
        composition: &Composition,
        output: &Path,
        options: &RenderOptions,
    ) -> MediaResult<()> {
        let plan = plan_render(composition, output, options.fps);
        for (path, text) in &plan.text_files {
            tokio::fs::write(path, text).await?;
        }

        let mut runner = FfmpegRunner::new();
        if let Some(cancel) = &options.cancel {
            runner = runner.with_cancel(cancel.clone());
        }
        runner.run(&plan.command).await?;

        info!(
            "Rendered {:.3}s at {} to {}",
            composition.duration(),
            composition.frame_size(),
            output.display()
        );
        Ok(())
    }
}
