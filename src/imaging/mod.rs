//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Fill-scale rotation, canvas rotation, shear** | `imageproc` projective warps |
//! | **Blur, flips, crop, resize, brightness** | `image::imageops` |
//! | **Noise, cutout** | `imageproc::noise`, `imageproc::drawing` |
//! | **Encode** | JPEG/PNG via `image`, LZW TIFF via `tiff`, flat PSD writer |
//!
//! The module is split into:
//! - **Calculations**: Pure geometry (fill-scale law, crop and cutout rectangles)
//! - **Parameters**: Data structures describing image operations and encodes
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Export of a finished variant in every selected format

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
mod psd;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    MAX_BLUR_RADIUS, MAX_EDGE, MAX_PIXELS, Rect, canvas_bounds, crop_rect_for_ratio, cutout_rect, fill_scale_factor,
    final_zoom_percent, resize_dimensions, within_canvas_limit,
};
pub use operations::{ExportError, export_variant, plan_exports};
pub use params::{
    AspectRatio, Axis, FormatOptions, JpegQuality, OutputFormat, PngCompression, ResizeSpec,
};
pub use rust_backend::{RustBackend, supported_input_extensions};
