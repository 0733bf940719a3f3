//! Instruction application.
//!
//! Instructions run strictly in list order, each against the composition
//! left by the ones before it. Trim and Crop replace the base clip, AddText
//! and AddLogo append an overlay spanning the composition as it stands, and
//! AddBackgroundAudio mixes a fetched track under the existing audio.
//! Anything that fails aborts the whole application.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::composition::{BackgroundAudio, Composition, ImageLayer, LayerKind, TextLayer};
use crate::engine::VideoEngine;
use crate::error::{MediaError, MediaResult};
use crate::fetch::Fetcher;
use crate::position::{resolve_position, DEFAULT_PADDING};
use vedit_models::{
    AspectRatio, BackgroundAudioInstruction, FrameSize, Instruction, LogoInstruction, TextEffect,
    TextInstruction, TrimInstruction,
};

/// Fade-in length for `effect: "fadein"`.
pub const TEXT_FADE_IN_SECS: f64 = 1.0;

/// Trimmed off the end of background tracks to avoid decoder tail artifacts.
pub const AUDIO_TAIL_GUARD_SECS: f64 = 0.05;

/// Applies instruction lists to compositions.
#[derive(Clone)]
pub struct InstructionEngine {
    engine: Arc<dyn VideoEngine>,
    fetcher: Fetcher,
}

impl InstructionEngine {
    pub fn new(engine: Arc<dyn VideoEngine>, fetcher: Fetcher) -> Self {
        Self { engine, fetcher }
    }

    /// Apply `instructions` in order. Fetched assets land in `assets_dir`,
    /// named after the instruction's index.
    pub async fn apply(
        &self,
        mut composition: Composition,
        instructions: &[Instruction],
        assets_dir: &Path,
    ) -> MediaResult<Composition> {
        for (index, instruction) in instructions.iter().enumerate() {
            debug!(
                "Applying instruction #{} ({}) at duration {:.3}s",
                index,
                instruction.action(),
                composition.duration()
            );
            match instruction {
                Instruction::Trim(trim) => apply_trim(&mut composition, index, trim)?,
                Instruction::Crop(crop) => apply_crop(&mut composition, index, crop.aspect_ratio)?,
                Instruction::AddText(text) => self.add_text(&mut composition, index, text)?,
                Instruction::AddLogo(logo) => {
                    self.add_logo(&mut composition, index, logo, assets_dir)
                        .await?
                }
                Instruction::AddBackgroundAudio(audio) => {
                    self.add_background_audio(&mut composition, index, audio, assets_dir)
                        .await?
                }
                Instruction::Unknown => {
                    debug!("Ignoring instruction #{} with unknown action", index);
                }
            }
        }

        info!(
            "Applied {} instructions: {:.3}s at {}, {} layers, {} background tracks",
            instructions.len(),
            composition.duration(),
            composition.frame_size(),
            composition.layers.len(),
            composition.background_audio.len()
        );
        Ok(composition)
    }

    fn add_text(
        &self,
        composition: &mut Composition,
        index: usize,
        text: &TextInstruction,
    ) -> MediaResult<()> {
        if text.fontsize == 0 {
            return Err(MediaError::invalid_instruction(
                index,
                "add_text",
                "fontsize must be positive",
            ));
        }
        let opacity = text
            .opacity
            .map(|o| check_opacity(index, "add_text", o))
            .transpose()?;

        let size = self.engine.measure_text(&text.text, text.fontsize);
        let (x, y) = resolve_position(
            text.position,
            size,
            composition.frame_size(),
            DEFAULT_PADDING,
        );

        composition.push_layer(LayerKind::Text(TextLayer {
            text: text.text.clone(),
            fontsize: text.fontsize,
            font_color: text.font_color.clone(),
            background_color: text.background_color.clone(),
            size,
            x,
            y,
            fade_in: (text.effect == Some(TextEffect::FadeIn)).then_some(TEXT_FADE_IN_SECS),
            opacity,
        }));
        Ok(())
    }

    async fn add_logo(
        &self,
        composition: &mut Composition,
        index: usize,
        logo: &LogoInstruction,
        assets_dir: &Path,
    ) -> MediaResult<()> {
        if logo.size.width == 0 || logo.size.height == 0 {
            return Err(MediaError::invalid_instruction(
                index,
                "add_logo",
                format!("size {} must be non-zero", logo.size),
            ));
        }
        let opacity = check_opacity(index, "add_logo", logo.opacity)?;

        let path = assets_dir.join(format!("logo_{}.png", index));
        self.fetcher.fetch(&logo.logo_url, &path).await?;

        let (x, y) = resolve_position(
            logo.position,
            logo.size,
            composition.frame_size(),
            DEFAULT_PADDING,
        );
        composition.push_layer(LayerKind::Image(ImageLayer {
            path,
            size: logo.size,
            x,
            y,
            opacity,
        }));
        Ok(())
    }

    async fn add_background_audio(
        &self,
        composition: &mut Composition,
        index: usize,
        audio: &BackgroundAudioInstruction,
        assets_dir: &Path,
    ) -> MediaResult<()> {
        if !(audio.volume.is_finite() && audio.volume >= 0.0) {
            return Err(MediaError::invalid_instruction(
                index,
                "add_background_audio",
                format!("volume {} must be a non-negative number", audio.volume),
            ));
        }

        let path = assets_dir.join(format!("background_audio_{}.mp3", index));
        self.fetcher.fetch(&audio.audio_url, &path).await?;

        let track_duration = self.engine.audio_duration(&path).await?;
        let duration = composition
            .duration()
            .min(track_duration - AUDIO_TAIL_GUARD_SECS);
        if duration <= 0.0 {
            return Err(MediaError::invalid_instruction(
                index,
                "add_background_audio",
                format!("audio track is too short ({:.3}s)", track_duration),
            ));
        }

        composition.background_audio.push(BackgroundAudio {
            path,
            volume: audio.volume,
            source_start: 0.0,
            duration,
            timeline_offset: 0.0,
        });
        Ok(())
    }
}

fn apply_trim(composition: &mut Composition, index: usize, trim: &TrimInstruction) -> MediaResult<()> {
    let duration = composition.duration();
    let start = trim.start.unwrap_or(0.0);
    let end = trim.end.unwrap_or(duration);

    let trimmed = composition.base.subclip(start, end).ok_or_else(|| {
        MediaError::invalid_instruction(
            index,
            "trim",
            format!(
                "range [{}, {}) is outside [0, {:.3}] or empty",
                start, end, duration
            ),
        )
    })?;
    composition.retime(trimmed, start);
    Ok(())
}

/// Stretch the base to `ratio` keeping its height; width is rounded to an
/// even number of pixels for the encoder.
fn apply_crop(composition: &mut Composition, index: usize, ratio: AspectRatio) -> MediaResult<()> {
    if !ratio.is_valid() {
        return Err(MediaError::invalid_instruction(
            index,
            "crop",
            format!("aspect ratio {} must have non-zero components", ratio),
        ));
    }
    let height = composition.frame_size().height;
    let size = FrameSize::new(reframed_width(height, ratio), height);
    composition.base = composition.base.reframed(size);
    Ok(())
}

fn reframed_width(height: u32, ratio: AspectRatio) -> u32 {
    let width = (height as f64 * ratio.as_f64()).round() as u32;
    (width + width % 2).max(2)
}

fn check_opacity(index: usize, action: &'static str, opacity: f32) -> MediaResult<f32> {
    if (0.0..=1.0).contains(&opacity) {
        Ok(opacity)
    } else {
        Err(MediaError::invalid_instruction(
            index,
            action,
            format!("opacity {} must be within [0, 1]", opacity),
        ))
    }
}
