//! Shared data models for the VEdit backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job identifiers and the job status lifecycle
//! - Declarative editing instructions and their parameters
//! - HTTP request/response schemas for submission and status polling

pub mod instruction;
pub mod job;
pub mod request;

pub use instruction::{
    AspectRatio, BackgroundAudioInstruction, CropInstruction, FrameSize, Instruction,
    LogoInstruction, Position, TextEffect, TextInstruction, TrimInstruction,
};
pub use job::{InvalidTransition, Job, JobId, JobStatus};
pub use request::{ProcessVideoRequest, ProcessVideoResponse, StatusResponse};
