//! Frame similarity scoring.
//!
//! Structural similarity comes from `image-compare` (`MSSIMSimple`) over
//! the grayscale buffers the decoder produces.

use image::GrayImage;
use image_compare::Algorithm;

use crate::error::{MediaError, MediaResult};
use crate::frames::GrayFrame;

/// Scores two equally-shaped grayscale frames; 1.0 means identical.
pub trait FrameSimilarity: Send + Sync {
    fn score(&self, a: &GrayFrame, b: &GrayFrame) -> MediaResult<f64>;
}

/// Mean SSIM as computed by `image_compare::gray_similarity_structure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ssim;

impl Ssim {
    pub fn new() -> Self {
        Self
    }
}

fn to_image(frame: &GrayFrame) -> MediaResult<GrayImage> {
    GrayImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
        MediaError::InvalidVideo(format!(
            "frame buffer does not match {}",
            frame.size()
        ))
    })
}

impl FrameSimilarity for Ssim {
    fn score(&self, a: &GrayFrame, b: &GrayFrame) -> MediaResult<f64> {
        if a.size() != b.size() {
            return Err(MediaError::InvalidVideo(format!(
                "cannot compare frames of different shapes ({} vs {})",
                a.size(),
                b.size()
            )));
        }
        if a.width == 0 || a.height == 0 {
            return Err(MediaError::InvalidVideo("cannot compare empty frames".into()));
        }

        let similarity = image_compare::gray_similarity_structure(
            &Algorithm::MSSIMSimple,
            &to_image(a)?,
            &to_image(b)?,
        )
        .map_err(|e| MediaError::InvalidVideo(format!("frame comparison failed: {}", e)))?;

        Ok(similarity.score.clamp(0.0, 1.0))
    }
}
