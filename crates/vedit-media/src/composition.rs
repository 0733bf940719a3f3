//! Working composition threaded through instruction application.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::timeline::{Clip, Interval};
use vedit_models::FrameSize;

/// Text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayer {
    pub text: String,
    pub fontsize: u32,
    pub font_color: String,
    pub background_color: Option<String>,
    /// Estimated rendered extent, used for placement
    pub size: FrameSize,
    pub x: i32,
    pub y: i32,
    /// Fade-in length in seconds
    pub fade_in: Option<f64>,
    pub opacity: Option<f32>,
}

/// Still-image overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    pub path: PathBuf,
    pub size: FrameSize,
    pub x: i32,
    pub y: i32,
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    Text(TextLayer),
    Image(ImageLayer),
}

/// An overlay visible over `span` of the composition timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLayer {
    pub kind: LayerKind,
    pub span: Interval,
}

/// Audio track mixed under the base clip's own audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundAudio {
    pub path: PathBuf,
    pub volume: f32,
    /// Offset into the track where playback starts
    pub source_start: f64,
    pub duration: f64,
    /// Composition time at which the track starts
    pub timeline_offset: f64,
}

/// Base clip plus everything stacked on top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub base: Clip,
    pub layers: Vec<OverlayLayer>,
    pub background_audio: Vec<BackgroundAudio>,
}

impl Composition {
    pub fn new(base: Clip) -> Self {
        Self {
            base,
            layers: Vec::new(),
            background_audio: Vec::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.base.duration()
    }

    pub fn frame_size(&self) -> FrameSize {
        self.base.frame_size
    }

    /// Add an overlay covering the whole current timeline.
    pub fn push_layer(&mut self, kind: LayerKind) {
        let span = Interval::new(0.0, self.duration());
        self.layers.push(OverlayLayer { kind, span });
    }

    /// Replace the base with `trimmed`, which must be `[start, start +
    /// trimmed.duration())` of the current base. Layers and background
    /// audio are shifted onto the new timeline; those left with nothing
    /// visible or audible are dropped.
    pub fn retime(&mut self, trimmed: Clip, start: f64) {
        let end = start + trimmed.duration();
        self.base = trimmed;

        self.layers = std::mem::take(&mut self.layers)
            .into_iter()
            .filter_map(|layer| {
                let span = Interval::new(
                    layer.span.start.max(start) - start,
                    layer.span.end.min(end) - start,
                );
                (!span.is_empty()).then_some(OverlayLayer { span, ..layer })
            })
            .collect();

        self.background_audio = std::mem::take(&mut self.background_audio)
            .into_iter()
            .filter_map(|track| {
                let track_end = track.timeline_offset + track.duration;
                let lo = track.timeline_offset.max(start);
                let hi = track_end.min(end);
                if Interval::new(lo, hi).is_empty() {
                    return None;
                }
                Some(BackgroundAudio {
                    source_start: track.source_start + (lo - track.timeline_offset),
                    duration: hi - lo,
                    timeline_offset: lo - start,
                    ..track
                })
            })
            .collect();
    }
}
