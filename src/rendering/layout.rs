/// Geometry of the captured root: the box the rasterizer sizes its surface from

use crate::dom::{Document, NodeId};

/// Size used by browsers for an `<svg>` with no usable width/height.
pub const DEFAULT_WIDTH: f32 = 300.0;
pub const DEFAULT_HEIGHT: f32 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    /// Pixel size of this box drawn at `scale`, rounded up.
    pub fn scaled_size(&self, scale: f32) -> (u32, u32) {
        (
            (self.width * scale).ceil().max(0.0) as u32,
            (self.height * scale).ceil().max(0.0) as u32,
        )
    }
}

/// Parse an absolute CSS length in px (`12`, `12px`, `1.5e1px`).
///
/// Relative units, percentages and keywords yield `None`.
pub fn parse_px(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim_end();
    number
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// `viewBox` as `(min-x, min-y, width, height)`, only when width and height are positive.
pub fn parse_view_box(value: &str) -> Option<(f32, f32, f32, f32)> {
    let nums: Vec<f32> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match nums.as_slice() {
        &[x, y, w, h] if w > 0.0 && h > 0.0 => Some((x, y, w, h)),
        _ => None,
    }
}

/// Box of an `<svg>` element without a layout engine.
///
/// Width and height come from the cascaded CSS value, then the attribute. A
/// missing dimension is derived from the other through the `viewBox` aspect
/// ratio, then from the `viewBox` itself, then the 300×150 default.
pub fn intrinsic_box(
    doc: &Document,
    node: NodeId,
    css_width: Option<&str>,
    css_height: Option<&str>,
) -> Rect {
    let element = doc.element(node);
    let attr = |name: &str| element.and_then(|e| e.attr(name));

    let width = css_width.and_then(parse_px).or_else(|| attr("width").and_then(parse_px));
    let height = css_height.and_then(parse_px).or_else(|| attr("height").and_then(parse_px));
    let view_box = attr("viewBox").and_then(parse_view_box);

    let (width, height) = match (width, height, view_box) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some((_, _, vw, vh))) => (w, w * vh / vw),
        (None, Some(h), Some((_, _, vw, vh))) => (h * vw / vh, h),
        (Some(w), None, None) => (w, DEFAULT_HEIGHT),
        (None, Some(h), None) => (DEFAULT_WIDTH, h),
        (None, None, Some((_, _, vw, vh))) => (vw, vh),
        (None, None, None) => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
    };
    Rect::new(width, height)
}
