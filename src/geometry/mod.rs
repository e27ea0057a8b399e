//! Geometry resolution
//!
//! Pure functions that turn a directive plus the source image's natural
//! dimensions into exact pixel geometry: the resize target, the crop
//! rectangle, and pad canvas placement. No I/O, recomputed per request.

use crate::directive::{Action, Gravity, TransformDirective};

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pixel offset inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Crop rectangle within the resized canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pad canvas: final size, where the scaled source lands, and the fill color
/// (`None` renders transparent, or black for opaque output formats).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadCanvas {
    pub size: Dimensions,
    pub origin: Point,
    pub color: Option<[u8; 3]>,
}

/// The exact pixel geometry for one request. Ephemeral: computed from the
/// directive and the source dimensions, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryPlan {
    /// Dimensions the source is scaled to before any crop or pad
    pub resize: Dimensions,
    /// Crop rectangle, always fully contained within `resize`
    pub crop: Option<CropRect>,
    /// Pad canvas, only for pad actions
    pub pad: Option<PadCanvas>,
}

impl GeometryPlan {
    /// A plan that leaves the source untouched.
    pub fn identity(source: Dimensions) -> Self {
        Self {
            resize: source,
            crop: None,
            pad: None,
        }
    }

    /// True when applying this plan would change nothing.
    pub fn is_identity(&self, source: Dimensions) -> bool {
        self.resize == source && self.crop.is_none() && self.pad.is_none()
    }
}

/// Anchor a target box inside a container according to gravity.
///
/// Each axis resolves independently: pinned to the near edge, the far edge,
/// or centered with `floor((container - target) / 2)`. Center behavior
/// applies for `c` and for any axis the gravity code does not pin.
pub fn gravity_anchor(gravity: Gravity, container: Dimensions, target: Dimensions) -> Point {
    let span_x = container.width.saturating_sub(target.width);
    let span_y = container.height.saturating_sub(target.height);

    let x = if gravity.is_west() {
        0
    } else if gravity.is_east() {
        span_x
    } else {
        span_x / 2
    };

    let y = if gravity.is_north() {
        0
    } else if gravity.is_south() {
        span_y
    } else {
        span_y / 2
    };

    Point { x, y }
}

/// Clamp explicit offsets so the target box stays inside the container.
/// Out-of-range values are pulled back to the nearest valid bound.
pub fn clamp_offset(x: u32, y: u32, container: Dimensions, target: Dimensions) -> Point {
    Point {
        x: x.min(container.width.saturating_sub(target.width)),
        y: y.min(container.height.saturating_sub(target.height)),
    }
}

/// Position a crop box of `target` within `container`, preferring the
/// directive's explicit offsets over its gravity, per axis.
fn crop_origin(directive: &TransformDirective, container: Dimensions, target: Dimensions) -> Point {
    let anchor = gravity_anchor(directive.gravity, container, target);
    clamp_offset(
        directive.x.unwrap_or(anchor.x),
        directive.y.unwrap_or(anchor.y),
        container,
        target,
    )
}

/// Fill-crop geometry: scale with `max(targetW/sourceW, targetH/sourceH)` so
/// the requested box is fully covered, then crop the excess along the
/// non-limiting axis at the gravity anchor.
pub fn crop_fill(directive: &TransformDirective, source: Dimensions) -> GeometryPlan {
    let target_w = directive.width.unwrap_or(source.width).max(1);
    let target_h = directive.height.unwrap_or(source.height).max(1);

    let scale = f64::max(
        target_w as f64 / source.width as f64,
        target_h as f64 / source.height as f64,
    );

    let resize = Dimensions {
        width: ((source.width as f64 * scale).round() as u32).max(target_w),
        height: ((source.height as f64 * scale).round() as u32).max(target_h),
    };

    let crop_size = Dimensions::new(target_w.min(resize.width), target_h.min(resize.height));
    let origin = crop_origin(directive, resize, crop_size);

    GeometryPlan {
        resize,
        crop: Some(CropRect {
            x: origin.x,
            y: origin.y,
            width: crop_size.width,
            height: crop_size.height,
        }),
        pad: None,
    }
}

/// Pad geometry: scale with `min(targetW/sourceW, targetH/sourceH)` so the
/// whole source fits, and fill the remaining canvas with the padding color.
/// No cropping occurs.
pub fn pad(directive: &TransformDirective, source: Dimensions) -> GeometryPlan {
    let target_w = directive.width.unwrap_or(source.width).max(1);
    let target_h = directive.height.unwrap_or(source.height).max(1);

    let scale = f64::min(
        target_w as f64 / source.width as f64,
        target_h as f64 / source.height as f64,
    );

    let resize = Dimensions {
        width: ((source.width as f64 * scale).round() as u32)
            .clamp(1, target_w),
        height: ((source.height as f64 * scale).round() as u32)
            .clamp(1, target_h),
    };

    let canvas = Dimensions::new(target_w, target_h);
    let origin = gravity_anchor(directive.gravity, canvas, resize);

    GeometryPlan {
        resize,
        crop: None,
        pad: Some(PadCanvas {
            size: canvas,
            origin,
            color: directive.padding_color,
        }),
    }
}

/// Aspect-preserving resize. With both dimensions set the source fits within
/// the box; with one set the source scales to match it exactly.
/// `allow_upscale` is off for max-dimension-bounded originals.
fn fit(
    width: Option<u32>,
    height: Option<u32>,
    source: Dimensions,
    allow_upscale: bool,
) -> GeometryPlan {
    let mut scale = match (width, height) {
        (Some(w), Some(h)) => f64::min(
            w as f64 / source.width as f64,
            h as f64 / source.height as f64,
        ),
        (Some(w), None) => w as f64 / source.width as f64,
        (None, Some(h)) => h as f64 / source.height as f64,
        (None, None) => 1.0,
    };

    if !allow_upscale {
        scale = scale.min(1.0);
    }

    GeometryPlan {
        resize: Dimensions {
            width: ((source.width as f64 * scale).round() as u32).max(1),
            height: ((source.height as f64 * scale).round() as u32).max(1),
        },
        crop: None,
        pad: None,
    }
}

/// Resolve the full geometry plan for a directive against the source's
/// natural dimensions.
pub fn plan_for(directive: &TransformDirective, source: Dimensions) -> GeometryPlan {
    match directive.action {
        Action::Square | Action::Crop => crop_fill(directive, source),
        Action::Pad => pad(directive, source),
        Action::Resize => fit(directive.width, directive.height, source, true),
        // A dimensioned original is the configured bounding box; never upscale.
        Action::Original => fit(directive.width, directive.height, source, false),
        Action::Json => GeometryPlan::identity(source),
    }
}
