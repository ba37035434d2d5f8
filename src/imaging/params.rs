//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline (which decides which operations a variant
//! gets) and the [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`JpegQuality`]: JPEG quality on the 1–12 scale photo editors use. Clamped on construction.
//! - [`PngCompression`]: PNG compression level 0–9. Clamped on construction.
//! - [`OutputFormat`]: The four export formats and their file extensions.
//! - [`FormatOptions`]: Per-format encoder settings for one export.
//! - [`Axis`]: Flip direction.
//! - [`ResizeSpec`]: Percentage or absolute resize target.
//! - [`AspectRatio`]: Target `width:height` ratio for crops.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JPEG quality on the 1–12 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegQuality(u8);

impl JpegQuality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 12;

    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Map onto the 1–100 scale the JPEG encoder expects (12 → 100).
    pub fn encoder_quality(self) -> u8 {
        ((self.0 as u32 * 100 + 6) / 12).clamp(1, 100) as u8
    }
}

impl Default for JpegQuality {
    fn default() -> Self {
        Self(10)
    }
}

/// PNG compression level (0 = fastest, 9 = smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngCompression(u8);

impl PngCompression {
    pub const MAX: u8 = 9;

    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl Default for PngCompression {
    fn default() -> Self {
        Self(6)
    }
}

/// Export format for a finished variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    #[serde(alias = "tif")]
    Tiff,
    Psd,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tif",
            OutputFormat::Psd => "psd",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::Psd => "PSD",
        };
        f.write_str(name)
    }
}

/// Encoder settings shared by every export of a run.
///
/// TIFF is always LZW-compressed without layers and PSD is always an
/// uncompressed single-layer document, so neither carries options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatOptions {
    pub jpeg_quality: JpegQuality,
    pub png_compression: PngCompression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => f.write_str("horizontal"),
            Axis::Vertical => f.write_str("vertical"),
        }
    }
}

/// Resize target: a uniform percentage or exact pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeSpec {
    Percent(f64),
    Exact { width: u32, height: u32 },
}

/// Target aspect ratio as `width:height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
}

impl AspectRatio {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn value(self) -> f64 {
        self.width / self.height
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}
