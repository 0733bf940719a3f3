//! Clip timeline model.
//!
//! A [`Clip`] is an edit decision list over one source file: an ordered list
//! of source-time intervals played back to back. Sub-ranging and
//! concatenation only rewrite that list; pixels are touched once, at render
//! time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::probe::MediaInfo;
use vedit_models::FrameSize;

/// Pieces shorter than this are dropped when sub-ranging.
const MIN_PIECE_SECS: f64 = 1e-6;

/// Half-open time interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.duration() <= MIN_PIECE_SECS
    }
}

/// Playable view over a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub source: PathBuf,
    pub info: MediaInfo,
    /// Source-time intervals, played in order
    pub segments: Vec<Interval>,
    /// Output frame size (differs from the source after a reframe)
    pub frame_size: FrameSize,
}

impl Clip {
    /// The whole source.
    pub fn from_source(source: impl AsRef<Path>, info: MediaInfo) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            info,
            segments: vec![Interval::new(0.0, info.duration)],
            frame_size: info.size,
        }
    }

    /// The given source intervals concatenated in order. Empty intervals are
    /// skipped; if nothing remains the whole source is used.
    pub fn concat(&self, intervals: &[Interval]) -> Self {
        let segments: Vec<Interval> = intervals
            .iter()
            .copied()
            .filter(|i| !i.is_empty())
            .collect();
        if segments.is_empty() {
            return Self::from_source(&self.source, self.info);
        }
        Self {
            segments,
            ..self.clone()
        }
    }

    /// Total playback duration.
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(Interval::duration).sum()
    }

    pub fn has_audio(&self) -> bool {
        self.info.has_audio
    }

    /// `[start, end)` of this clip's own timeline, or `None` unless
    /// `0 <= start < end <= duration`.
    pub fn subclip(&self, start: f64, end: f64) -> Option<Self> {
        let duration = self.duration();
        if !(start.is_finite() && end.is_finite()) {
            return None;
        }
        if start < 0.0 || start >= end || end > duration + MIN_PIECE_SECS {
            return None;
        }

        let mut segments = Vec::new();
        let mut offset = 0.0;
        for seg in &self.segments {
            let seg_end = offset + seg.duration();
            let lo = start.max(offset);
            let hi = end.min(seg_end);
            if hi - lo > MIN_PIECE_SECS {
                segments.push(Interval::new(
                    seg.start + (lo - offset),
                    seg.start + (hi - offset),
                ));
            }
            offset = seg_end;
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self {
            segments,
            ..self.clone()
        })
    }

    /// Same timeline rendered at a different frame size.
    pub fn reframed(&self, frame_size: FrameSize) -> Self {
        Self {
            frame_size,
            ..self.clone()
        }
    }
}
