//! Named overlay placement.

use vedit_models::{FrameSize, Position};

/// Margin between an overlay and the canvas edge.
pub const DEFAULT_PADDING: i32 = 20;

/// Top-left pixel coordinate placing `layer` on `canvas` at `position`.
///
/// Corners keep `padding` pixels from both adjacent edges; `Center` ignores
/// padding. A missing or unrecognized position resolves to the origin.
/// Coordinates go negative when the layer is larger than the canvas.
pub fn resolve_position(
    position: Option<Position>,
    layer: FrameSize,
    canvas: FrameSize,
    padding: i32,
) -> (i32, i32) {
    let (lw, lh) = (layer.width as i32, layer.height as i32);
    let (cw, ch) = (canvas.width as i32, canvas.height as i32);

    match position {
        Some(Position::TopLeft) => (padding, padding),
        Some(Position::TopRight) => (cw - lw - padding, padding),
        Some(Position::BottomLeft) => (padding, ch - lh - padding),
        Some(Position::BottomRight) => (cw - lw - padding, ch - lh - padding),
        Some(Position::Center) => ((cw - lw).div_euclid(2), (ch - lh).div_euclid(2)),
        Some(Position::Unrecognized) | None => (0, 0),
    }
}
