//! Video engine seam.
//!
//! Everything that decodes or encodes pixels sits behind [`VideoEngine`], so
//! segmentation and instruction application can be exercised without
//! FFmpeg installed.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::watch;

use crate::composition::Composition;
use crate::error::MediaResult;
use crate::frames::FrameSource;
use crate::timeline::Clip;
use vedit_models::FrameSize;

/// Per-render settings.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub fps: u32,
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            cancel: None,
        }
    }
}

#[async_trait]
pub trait VideoEngine: Send + Sync {
    /// Open a video file as a clip covering the whole source.
    async fn load_clip(&self, path: &Path) -> MediaResult<Clip>;

    /// Duration of an audio file in seconds.
    async fn audio_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Rendered extent of a single line of text.
    fn measure_text(&self, text: &str, fontsize: u32) -> FrameSize {
        estimate_text_size(text, fontsize)
    }

    /// Decode the clip's source sequentially as grayscale frames.
    async fn open_frames(&self, clip: &Clip) -> MediaResult<Box<dyn FrameSource>>;

    /// Flatten and encode a composition into `output`.
    async fn render(
        &self,
        composition: &Composition,
        output: &Path,
        options: &RenderOptions,
    ) -> MediaResult<()>;
}

/// Bold sans-serif glyphs average roughly 0.6 em wide; lines are 1.2 em.
pub fn estimate_text_size(text: &str, fontsize: u32) -> FrameSize {
    let chars = text.chars().count().max(1) as u32;
    // ceil(fs * 3/5 * chars) x ceil(fs * 6/5)
    FrameSize::new(
        fontsize.saturating_mul(chars).saturating_mul(3).div_ceil(5),
        fontsize.saturating_mul(6).div_ceil(5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_text_size() {
        assert_eq!(estimate_text_size("Hi", 70), FrameSize::new(84, 84));
        assert_eq!(estimate_text_size("", 10), FrameSize::new(6, 12));
    }
}
