//! Scene cut detection.
//!
//! # Algorithm
//! 1. Decode frames sequentially as grayscale
//! 2. Score each frame against the one immediately before it with SSIM
//! 3. If the score drops below [`SCENE_CUT_THRESHOLD`], record the frame index
//!
//! The cut list is buffered in full before it is returned; interval
//! construction needs all of it.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::VideoEngine;
use crate::error::{MediaError, MediaResult};
use crate::frames::{FrameSource, GrayFrame};
use crate::similarity::{FrameSimilarity, Ssim};
use crate::timeline::{Clip, Interval};

/// Similarity below which consecutive frames are a shot change.
pub const SCENE_CUT_THRESHOLD: f64 = 0.5;

/// Frame indices where a new shot begins, in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneList {
    pub cut_points: Vec<u64>,
    pub frames_scanned: u64,
}

impl SceneList {
    pub fn is_empty(&self) -> bool {
        self.cut_points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cut_points.len()
    }
}

/// Finds shot changes in a video.
pub struct SceneSegmenter {
    engine: Arc<dyn VideoEngine>,
    similarity: Arc<dyn FrameSimilarity>,
}

impl SceneSegmenter {
    pub fn new(engine: Arc<dyn VideoEngine>) -> Self {
        Self {
            engine,
            similarity: Arc::new(Ssim::new()),
        }
    }

    /// Replace the similarity primitive.
    pub fn with_similarity(mut self, similarity: Arc<dyn FrameSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Scan the video at `path`.
    pub async fn segment(&self, path: &Path) -> MediaResult<SceneList> {
        let clip = self.engine.load_clip(path).await?;
        self.segment_clip(&clip).await
    }

    /// Scan an already loaded clip's source.
    pub async fn segment_clip(&self, clip: &Clip) -> MediaResult<SceneList> {
        let mut frames = self.engine.open_frames(clip).await?;
        let scenes = self.segment_frames(frames.as_mut()).await?;
        info!(
            "Scanned {} frames of {}, found {} scene cuts",
            scenes.frames_scanned,
            clip.source.display(),
            scenes.len()
        );
        Ok(scenes)
    }

    /// Scan an arbitrary frame stream.
    pub async fn segment_frames(&self, frames: &mut dyn FrameSource) -> MediaResult<SceneList> {
        let mut scenes = SceneList::default();
        let mut previous: Option<GrayFrame> = None;
        let mut index: u64 = 0;

        while let Some(frame) = frames.next_frame().await? {
            if let Some(prev) = &previous {
                let score = self.similarity.score(prev, &frame).map_err(|e| match e {
                    MediaError::SegmentationFailed { .. } => e,
                    other => MediaError::segmentation_failed(index, other.to_string()),
                })?;
                if score < SCENE_CUT_THRESHOLD {
                    debug!("Scene cut at frame {} (ssim {:.3})", index, score);
                    scenes.cut_points.push(index);
                }
            }
            previous = Some(frame);
            index += 1;
        }

        scenes.frames_scanned = index;
        Ok(scenes)
    }
}

/// Source-time intervals retained by segmentation.
///
/// N cut points give the N-1 intervals between consecutive cuts. With no
/// cuts the whole source (`[0, duration)`) is one interval. A single cut
/// yields no intervals; callers fall back to the whole source.
pub fn scene_intervals(scenes: &SceneList, fps: f64, duration: f64) -> Vec<Interval> {
    if scenes.cut_points.is_empty() || fps <= 0.0 {
        return vec![Interval::new(0.0, duration)];
    }
    scenes
        .cut_points
        .windows(2)
        .map(|pair| Interval::new(pair[0] as f64 / fps, pair[1] as f64 / fps))
        .collect()
}
