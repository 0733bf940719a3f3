//! Media side of the video editing service.
//!
//! This crate provides:
//! - Streaming asset fetches into a job workspace
//! - Scene cut detection over grayscale frames scored with SSIM
//! - An edit-list clip model and the composition built on top of it
//! - Instruction application (trim, crop, text, logo, background audio)
//! - A [`VideoEngine`] seam with an FFmpeg CLI implementation

pub mod command;
pub mod composition;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod ffmpeg;
pub mod frames;
pub mod instructions;
pub mod position;
pub mod probe;
pub mod render;
pub mod scene;
pub mod similarity;
pub mod timeline;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use composition::{BackgroundAudio, Composition, ImageLayer, LayerKind, OverlayLayer, TextLayer};
pub use engine::{estimate_text_size, RenderOptions, VideoEngine};
pub use error::{MediaError, MediaResult};
pub use fetch::{FetchConfig, Fetcher};
pub use ffmpeg::FfmpegEngine;
pub use frames::{FfmpegFrameSource, FrameSource, GrayFrame, MemoryFrameSource};
pub use instructions::InstructionEngine;
pub use position::{resolve_position, DEFAULT_PADDING};
pub use probe::{probe_media, probe_video, MediaInfo};
pub use scene::{scene_intervals, SceneList, SceneSegmenter, SCENE_CUT_THRESHOLD};
pub use similarity::{FrameSimilarity, Ssim};
pub use timeline::{Clip, Interval};
