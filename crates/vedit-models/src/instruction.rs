//! Declarative editing instructions.
//!
//! Instructions arrive as a JSON list tagged by `action` and are applied in
//! the order received. Unknown actions and unknown position names are kept
//! as explicit variants so the caller can decide between silently ignoring
//! them and rejecting the request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width/height pair in pixels, serialized as `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<[u32; 2]> for FrameSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<FrameSize> for [u32; 2] {
    fn from(size: FrameSize) -> Self {
        [size.width, size.height]
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Target aspect ratio as `[horizontal, vertical]`, e.g. `[9, 16]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct AspectRatio {
    pub horizontal: u32,
    pub vertical: u32,
}

impl AspectRatio {
    pub const fn new(horizontal: u32, vertical: u32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.horizontal > 0 && self.vertical > 0
    }

    /// Width divided by height.
    pub fn as_f64(&self) -> f64 {
        self.horizontal as f64 / self.vertical as f64
    }
}

impl Default for AspectRatio {
    /// Vertical 9:16 (short-form video).
    fn default() -> Self {
        Self::new(9, 16)
    }
}

impl From<[u32; 2]> for AspectRatio {
    fn from([horizontal, vertical]: [u32; 2]) -> Self {
        Self::new(horizontal, vertical)
    }
}

impl From<AspectRatio> for [u32; 2] {
    fn from(ratio: AspectRatio) -> Self {
        [ratio.horizontal, ratio.vertical]
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.horizontal, self.vertical)
    }
}

/// Named overlay anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    /// Any name not listed above; resolves to the canvas origin.
    #[serde(other)]
    Unrecognized,
}

impl Position {
    /// Parse a position name. Never fails: unknown names map to `Unrecognized`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "top_left" => Position::TopLeft,
            "top_right" => Position::TopRight,
            "bottom_left" => Position::BottomLeft,
            "bottom_right" => Position::BottomRight,
            "center" => Position::Center,
            _ => Position::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::TopLeft => "top_left",
            Position::TopRight => "top_right",
            Position::BottomLeft => "bottom_left",
            Position::BottomRight => "bottom_right",
            Position::Center => "center",
            Position::Unrecognized => "unrecognized",
        }
    }
}

/// Text entrance effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEffect {
    /// One-second fade in
    #[serde(rename = "fadein")]
    FadeIn,
    #[serde(other)]
    Unrecognized,
}

/// `trim`: keep `[start, end)` of the current base clip.
///
/// Bounds are relative to the composition as it stands when the trim is
/// applied, so a second trim cuts the already trimmed clip rather than the
/// original source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrimInstruction {
    /// Seconds; defaults to 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Seconds; defaults to the current composition's duration, not the
    /// source's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

/// `crop`: reframe the base clip to an aspect ratio.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CropInstruction {
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

/// `add_text`: full-duration text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInstruction {
    pub text: String,
    #[serde(default = "default_font_size")]
    pub fontsize: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<TextEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
}

/// `add_logo`: image overlay fetched from a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoInstruction {
    pub logo_url: String,
    #[serde(default = "default_logo_size")]
    pub size: FrameSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default = "default_logo_opacity")]
    pub opacity: f32,
}

/// `add_background_audio`: mix a fetched track under the existing audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundAudioInstruction {
    pub audio_url: String,
    #[serde(default = "default_background_volume")]
    pub volume: f32,
}

fn default_font_size() -> u32 {
    70
}

fn default_font_color() -> String {
    "white".to_string()
}

fn default_logo_size() -> FrameSize {
    FrameSize::new(100, 100)
}

fn default_logo_opacity() -> f32 {
    0.7
}

fn default_background_volume() -> f32 {
    0.3
}

/// One editing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Instruction {
    Trim(TrimInstruction),
    Crop(CropInstruction),
    AddText(TextInstruction),
    AddLogo(LogoInstruction),
    AddBackgroundAudio(BackgroundAudioInstruction),
    /// Any other `action` tag.
    #[serde(other)]
    Unknown,
}

impl Instruction {
    /// Action tag as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Instruction::Trim(_) => "trim",
            Instruction::Crop(_) => "crop",
            Instruction::AddText(_) => "add_text",
            Instruction::AddLogo(_) => "add_logo",
            Instruction::AddBackgroundAudio(_) => "add_background_audio",
            Instruction::Unknown => "unknown",
        }
    }

    /// Problems that lenient mode silently tolerates and strict mode rejects.
    pub fn strict_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let position = match self {
            Instruction::Unknown => {
                problems.push("unknown action".to_string());
                None
            }
            Instruction::AddText(text) => {
                if text.effect == Some(TextEffect::Unrecognized) {
                    problems.push("unknown text effect".to_string());
                }
                text.position
            }
            Instruction::AddLogo(logo) => logo.position,
            _ => None,
        };
        if position == Some(Position::Unrecognized) {
            problems.push("unknown position".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_instruction_list() {
        let raw = json!([
            {"action": "trim", "start": 0, "end": 5},
            {"action": "crop"},
            {"action": "add_text", "text": "Hi", "position": "top_left", "effect": "fadein"},
            {"action": "add_logo", "logo_url": "https://x/logo.png", "position": "bottom_right"},
            {"action": "add_background_audio", "audio_url": "https://x/a.mp3"}
        ]);
        let list: Vec<Instruction> = serde_json::from_value(raw).unwrap();

        assert_eq!(
            list[0],
            Instruction::Trim(TrimInstruction {
                start: Some(0.0),
                end: Some(5.0)
            })
        );
        assert_eq!(
            list[1],
            Instruction::Crop(CropInstruction {
                aspect_ratio: AspectRatio::new(9, 16)
            })
        );
        match &list[2] {
            Instruction::AddText(t) => {
                assert_eq!(t.fontsize, 70);
                assert_eq!(t.font_color, "white");
                assert_eq!(t.position, Some(Position::TopLeft));
                assert_eq!(t.effect, Some(TextEffect::FadeIn));
                assert_eq!(t.opacity, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &list[3] {
            Instruction::AddLogo(l) => {
                assert_eq!(l.size, FrameSize::new(100, 100));
                assert!((l.opacity - 0.7).abs() < f32::EPSILON);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &list[4] {
            Instruction::AddBackgroundAudio(a) => assert!((a.volume - 0.3).abs() < f32::EPSILON),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_and_position_are_preserved() {
        let list: Vec<Instruction> = serde_json::from_value(json!([
            {"action": "sharpen", "amount": 3},
            {"action": "add_logo", "logo_url": "u", "position": "middle_ish"}
        ]))
        .unwrap();

        assert_eq!(list[0], Instruction::Unknown);
        assert_eq!(list[0].strict_violations(), vec!["unknown action"]);
        assert_eq!(list[1].strict_violations(), vec!["unknown position"]);
    }

    #[test]
    fn test_missing_position_is_not_a_violation() {
        let list: Vec<Instruction> =
            serde_json::from_value(json!([{"action": "add_text", "text": "x"}])).unwrap();
        assert!(list[0].strict_violations().is_empty());
    }

    #[test]
    fn test_position_names() {
        assert_eq!(Position::from_name("center"), Position::Center);
        assert_eq!(Position::from_name("unknown"), Position::Unrecognized);
        assert_eq!(Position::BottomRight.as_str(), "bottom_right");
    }

    #[test]
    fn test_frame_size_wire_format() {
        let size: FrameSize = serde_json::from_value(json!([320, 240])).unwrap();
        assert_eq!(size, FrameSize::new(320, 240));
        assert_eq!(serde_json::to_value(size).unwrap(), json!([320, 240]));
    }
}
