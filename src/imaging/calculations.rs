//! Pure geometry for the augmentation pipeline.
//!
//! All functions here are pure and testable without any I/O or images. The
//! only input that is not a plain number is the random source taken by
//! [`cutout_rect`], which is injected so tests can pin it.
//!
//! ## Fill-scale law
//!
//! Rotating a square canvas of side `L` by `θ` about its center leaves four
//! empty corner triangles. Scaling the content up by `|cos θ| + |sin θ|`
//! before rotating makes the rotated content cover the whole canvas again.
//! The law is exact for square canvases only; non-square sources get the same
//! factor and may still show slivers along the long edge.

use super::params::{AspectRatio, ResizeSpec};
use rand::Rng;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Minimum uniform scale-up that leaves no empty corner after rotating a
/// square image by `rotation_degrees` about its center.
///
/// The result is `|cos θ| + |sin θ|`: at least 1.0, exactly 1.0 on quarter
/// turns and `√2` at 45°. The sign of the rotation is irrelevant. The angle is
/// reduced modulo 90° first, which is exact for floats and keeps the quarter
/// turn identities exact.
///
/// # Examples
/// ```
/// # use augmentor::imaging::fill_scale_factor;
/// assert_eq!(fill_scale_factor(90.0), 1.0);
/// assert!((fill_scale_factor(45.0) - std::f64::consts::SQRT_2).abs() < 1e-12);
/// ```
pub fn fill_scale_factor(rotation_degrees: f64) -> f64 {
    let theta = rotation_degrees.abs().rem_euclid(90.0).to_radians();
    theta.cos().abs() + theta.sin().abs()
}

/// Combine a user-requested zoom with the fill-scale factor of a rotation.
pub fn final_zoom_percent(user_zoom_percent: f64, rotation_degrees: f64) -> f64 {
    user_zoom_percent * fill_scale_factor(rotation_degrees)
}

/// Largest centered rectangle with the target aspect ratio.
///
/// - Wider than the target: left and right are cropped symmetrically.
/// - Taller than the target: top and bottom are cropped symmetrically.
/// - Same ratio: the full frame is returned unchanged.
///
/// The result never exceeds the source bounds and is at least 1 px on each side.
pub fn crop_rect_for_ratio(width: u32, height: u32, target: AspectRatio) -> Rect {
    let ratio = target.value();
    let current = width as f64 / height as f64;

    if current > ratio {
        let new_w = ((height as f64 * ratio).round() as u32).clamp(1, width);
        Rect {
            x: (width - new_w) / 2,
            y: 0,
            width: new_w,
            height,
        }
    } else {
        let new_h = ((width as f64 / ratio).round() as u32).clamp(1, height);
        Rect {
            x: 0,
            y: (height - new_h) / 2,
            width,
            height: new_h,
        }
    }
}

/// Random rectangle for the cutout step.
///
/// Width and height are drawn independently and uniformly from
/// `[0, max_percent% of that dimension]`; the origin is drawn uniformly among
/// the positions that keep the rectangle fully inside the image. The result
/// may be empty (zero width or height), in which case nothing is filled.
pub fn cutout_rect<R: Rng + ?Sized>(width: u32, height: u32, max_percent: f64, rng: &mut R) -> Rect {
    let max_fraction = (max_percent / 100.0).clamp(0.0, 1.0);

    let cut_w = ((width as f64 * rng.gen_range(0.0..=max_fraction)).floor() as u32).min(width);
    let cut_h = ((height as f64 * rng.gen_range(0.0..=max_fraction)).floor() as u32).min(height);

    let x = ((rng.gen_range(0.0..=1.0) * (width - cut_w) as f64).floor() as u32).min(width - cut_w);
    let y = ((rng.gen_range(0.0..=1.0) * (height - cut_h) as f64).floor() as u32).min(height - cut_h);

    Rect {
        x,
        y,
        width: cut_w,
        height: cut_h,
    }
}

/// Dimensions of the canvas needed to hold a `width`×`height` image rotated by
/// `degrees` about its center.
pub fn canvas_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let theta = degrees.rem_euclid(360.0).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (width as f64, height as f64);

    // Trim float noise so quarter turns don't grow by a pixel
    let new_w = (w * cos + h * sin - 1e-6).ceil().max(1.0);
    let new_h = (w * sin + h * cos - 1e-6).ceil().max(1.0);
    (new_w as u32, new_h as u32)
}

/// Largest edge, in pixels, any step may produce.
pub const MAX_EDGE: u32 = 30_000;

/// Largest Gaussian blur sigma; larger ones build kernels bigger than any
/// image within [`MAX_EDGE`].
pub const MAX_BLUR_RADIUS: f64 = 250.0;

/// Largest canvas area, in pixels, any step may produce.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Whether a `width`×`height` canvas is non-empty, has no edge above
/// [`MAX_EDGE`] and no more than [`MAX_PIXELS`] pixels.
pub fn within_canvas_limit(width: u32, height: u32) -> bool {
    (1..=MAX_EDGE).contains(&width)
        && (1..=MAX_EDGE).contains(&height)
        && u64::from(width) * u64::from(height) <= MAX_PIXELS
}

/// Target dimensions for a resize step.
///
/// Percentages scale both edges proportionally. Neither edge drops below 1 px.
pub fn resize_dimensions(width: u32, height: u32, size: ResizeSpec) -> (u32, u32) {
    match size {
        ResizeSpec::Percent(percent) => {
            let factor = percent / 100.0;
            let w = (width as f64 * factor).round().max(1.0) as u32;
            let h = (height as f64 * factor).round().max(1.0) as u32;
            (w, h)
        }
        ResizeSpec::Exact { width, height } => (width.max(1), height.max(1)),
    }
}
