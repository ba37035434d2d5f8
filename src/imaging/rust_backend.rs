//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary. Images are held as 8-bit
//! RGBA buffers for their whole life in the pipeline; areas uncovered by a
//! warp are filled with opaque white, like a flattened background layer.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, BMP, GIF) | `image` crate (pure Rust decoders) |
//! | Resize | `image::imageops::resize` with `CatmullRom` filter |
//! | Crop, flip, blur, brightness/contrast | `image::imageops` |
//! | Layer transform, canvas rotation, shear | `imageproc::geometric_transformations::warp` |
//! | Noise | `imageproc::noise::gaussian_noise_mut` |
//! | Cutout fill | `imageproc::drawing::draw_filled_rect_mut` |
//! | Encode → JPEG, PNG | `image::codecs` |
//! | Encode → TIFF (LZW) | `tiff` crate encoder |
//! | Encode → PSD | [`psd`](super::psd) writer |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{MAX_BLUR_RADIUS, MAX_EDGE, MAX_PIXELS, Rect, canvas_bounds, within_canvas_limit};
use super::params::{Axis, FormatOptions, OutputFormat, PngCompression};
use super::psd;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::geometric_transformations::{Interpolation, Projection, warp, warp_into};
use imageproc::noise::gaussian_noise_mut;
use imageproc::rect::Rect as FillRect;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::LazyLock;

/// Fill for pixels a warp uncovers.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
    ("gif", ImageFormat::Gif),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<RgbaImage, BackendError> {
    let decoded = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(decoded.to_rgba8())
}

/// Refuse canvases that are empty or too large to allocate.
fn check_canvas(width: u32, height: u32, operation: &str) -> Result<(), BackendError> {
    if within_canvas_limit(width, height) {
        Ok(())
    } else {
        Err(BackendError::ProcessingFailed(format!(
            "Cannot {operation} to {width}x{height} (limit {MAX_EDGE} px per edge, {MAX_PIXELS} px total)"
        )))
    }
}

fn center(img: &RgbaImage) -> (f32, f32) {
    (img.width() as f32 / 2.0, img.height() as f32 / 2.0)
}

/// Wrap `inner` so it acts about the image center instead of the origin.
fn about_center(img: &RgbaImage, inner: Projection) -> Projection {
    let (cx, cy) = center(img);
    Projection::translate(-cx, -cy)
        .and_then(inner)
        .and_then(Projection::translate(cx, cy))
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f64) -> f64 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Lookup table applying `stops` of exposure in linear light.
fn exposure_lut(stops: f64) -> [u8; 256] {
    let gain = 2f64.powf(stops);
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let linear = srgb_to_linear(i as f64 / 255.0) * gain;
        *entry = (linear_to_srgb(linear.clamp(0.0, 1.0)) * 255.0).round() as u8;
    }
    lut
}

fn png_compression_type(level: PngCompression) -> CompressionType {
    match level.level() {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, BackendError> {
    Ok(BufWriter::new(File::create(path)?))
}

fn save_jpeg(img: &RgbaImage, path: &Path, options: &FormatOptions) -> Result<(), BackendError> {
    let rgb = RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    });
    let encoder = JpegEncoder::new_with_quality(create_writer(path)?, options.jpeg_quality.encoder_quality());
    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))
}

fn save_png(img: &RgbaImage, path: &Path, options: &FormatOptions) -> Result<(), BackendError> {
    let encoder = PngEncoder::new_with_quality(
        create_writer(path)?,
        png_compression_type(options.png_compression),
        image::codecs::png::FilterType::Adaptive,
    );
    encoder
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {e}")))
}

fn save_tiff(img: &RgbaImage, path: &Path) -> Result<(), BackendError> {
    use tiff::encoder::{TiffEncoder, colortype, compression::Lzw};

    let mut encoder = TiffEncoder::new(create_writer(path)?)
        .map_err(|e| BackendError::ProcessingFailed(format!("TIFF encoder setup failed: {e}")))?;
    encoder
        .write_image_with_compression::<colortype::RGBA8, _>(img.width(), img.height(), Lzw::default(), img.as_raw())
        .map_err(|e| BackendError::ProcessingFailed(format!("TIFF encode failed: {e}")))
}

impl ImageBackend for RustBackend {
    type Handle = RgbaImage;

    fn open(&self, path: &Path) -> Result<RgbaImage, BackendError> {
        load_image(path)
    }

    fn duplicate(&self, handle: &RgbaImage) -> Result<RgbaImage, BackendError> {
        Ok(handle.clone())
    }

    fn dimensions(&self, handle: &RgbaImage) -> Dimensions {
        Dimensions {
            width: handle.width(),
            height: handle.height(),
        }
    }

    fn resize(&self, img: &mut RgbaImage, width: u32, height: u32) -> Result<(), BackendError> {
        check_canvas(width, height, "resize")?;
        *img = imageops::resize(&*img, width, height, FilterType::CatmullRom);
        Ok(())
    }

    fn crop(&self, img: &mut RgbaImage, rect: Rect) -> Result<(), BackendError> {
        let in_bounds = rect.x.checked_add(rect.width).is_some_and(|r| r <= img.width())
            && rect.y.checked_add(rect.height).is_some_and(|b| b <= img.height());
        if rect.is_empty() || !in_bounds {
            return Err(BackendError::ProcessingFailed(format!(
                "Crop {rect:?} outside {}x{} image",
                img.width(),
                img.height()
            )));
        }
        *img = imageops::crop_imm(&*img, rect.x, rect.y, rect.width, rect.height).to_image();
        Ok(())
    }

    fn transform_layer(&self, img: &mut RgbaImage, zoom_percent: f64, degrees: f64) -> Result<(), BackendError> {
        let scale = (zoom_percent / 100.0) as f32;
        if scale <= 0.0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Invalid zoom {zoom_percent}%"
            )));
        }
        // One fused warp: scaling and rotating separately would clip the
        // corners the scale-up is meant to fill
        let inner = Projection::scale(scale, scale).and_then(Projection::rotate((degrees as f32).to_radians()));
        let projection = about_center(img, inner);
        *img = warp(&*img, &projection, Interpolation::Bilinear, BACKGROUND);
        Ok(())
    }

    fn rotate_canvas(&self, img: &mut RgbaImage, degrees: f64) -> Result<(), BackendError> {
        let (new_w, new_h) = canvas_bounds(img.width(), img.height(), degrees);
        check_canvas(new_w, new_h, "canvas rotation")?;
        let (cx, cy) = center(img);
        let projection = Projection::translate(-cx, -cy)
            .and_then(Projection::rotate((degrees as f32).to_radians()))
            .and_then(Projection::translate(new_w as f32 / 2.0, new_h as f32 / 2.0));

        let mut canvas = RgbaImage::from_pixel(new_w, new_h, BACKGROUND);
        warp_into(&*img, &projection, Interpolation::Bilinear, BACKGROUND, &mut canvas);
        *img = canvas;
        Ok(())
    }

    fn flip(&self, img: &mut RgbaImage, axis: Axis) -> Result<(), BackendError> {
        match axis {
            Axis::Horizontal => imageops::flip_horizontal_in_place(img),
            Axis::Vertical => imageops::flip_vertical_in_place(img),
        }
        Ok(())
    }

    fn shear(&self, img: &mut RgbaImage, horizontal_degrees: f64, vertical_degrees: f64) -> Result<(), BackendError> {
        let tan_h = horizontal_degrees.to_radians().tan() as f32;
        let tan_v = vertical_degrees.to_radians().tan() as f32;
        let skew = Projection::from_matrix([1.0, tan_h, 0.0, tan_v, 1.0, 0.0, 0.0, 0.0, 1.0]).ok_or_else(|| {
            BackendError::ProcessingFailed(format!(
                "Shear {horizontal_degrees}°/{vertical_degrees}° is not invertible"
            ))
        })?;
        let projection = about_center(img, skew);
        *img = warp(&*img, &projection, Interpolation::Bilinear, BACKGROUND);
        Ok(())
    }

    fn gaussian_blur(&self, img: &mut RgbaImage, radius: f64) -> Result<(), BackendError> {
        if radius.is_nan() || radius > MAX_BLUR_RADIUS {
            return Err(BackendError::ProcessingFailed(format!(
                "Blur radius {radius} exceeds {MAX_BLUR_RADIUS}"
            )));
        }
        // imageops::blur treats a non-positive sigma as 1.0
        if radius > 0.0 {
            *img = imageops::blur(&*img, radius as f32);
        }
        Ok(())
    }

    fn add_noise(&self, img: &mut RgbaImage, percent: f64, seed: u64) -> Result<(), BackendError> {
        if percent <= 0.0 {
            return Ok(());
        }
        // Noise the color channels only so alpha stays intact
        let mut rgb = RgbImage::from_fn(img.width(), img.height(), |x, y| {
            let p = img.get_pixel(x, y);
            Rgb([p[0], p[1], p[2]])
        });
        gaussian_noise_mut(&mut rgb, 0.0, percent / 100.0 * 255.0, seed);
        for (dst, src) in img.pixels_mut().zip(rgb.pixels()) {
            dst.0[..3].copy_from_slice(&src.0);
        }
        Ok(())
    }

    fn adjust_brightness_contrast(&self, img: &mut RgbaImage, brightness: i32, contrast: i32) -> Result<(), BackendError> {
        if brightness != 0 {
            imageops::colorops::brighten_in_place(img, brightness);
        }
        if contrast != 0 {
            imageops::colorops::contrast_in_place(img, contrast as f32);
        }
        Ok(())
    }

    fn apply_exposure_and_flatten(&self, img: &mut RgbaImage, stops: f64) -> Result<(), BackendError> {
        let lut = exposure_lut(stops);
        for pixel in img.pixels_mut() {
            for channel in &mut pixel.0[..3] {
                *channel = lut[*channel as usize];
            }
        }
        Ok(())
    }

    fn fill_rect(&self, img: &mut RgbaImage, rect: Rect, rgb: [u8; 3]) -> Result<(), BackendError> {
        if rect.is_empty() {
            return Ok(());
        }
        let area = FillRect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height);
        draw_filled_rect_mut(img, area, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        Ok(())
    }

    fn encode_and_save(
        &self,
        img: &RgbaImage,
        path: &Path,
        format: OutputFormat,
        options: &FormatOptions,
    ) -> Result<(), BackendError> {
        match format {
            OutputFormat::Jpeg => save_jpeg(img, path, options),
            OutputFormat::Png => save_png(img, path, options),
            OutputFormat::Tiff => save_tiff(img, path),
            OutputFormat::Psd => psd::write_psd(img, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = super::supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp", "bmp", "gif"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn open_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let backend = RustBackend::new();
        let handle = backend.open(&path).unwrap();
        assert_eq!(
            backend.dimensions(&handle),
            Dimensions {
                width: 200,
                height: 150
            }
        );
    }

    #[test]
    fn open_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.open(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn open_garbage_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = RustBackend::new().open(&path);
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn duplicate_is_independent() {
        let backend = RustBackend::new();
        let original = solid(10, 10, 100);
        let mut copy = backend.duplicate(&original).unwrap();
        backend.adjust_brightness_contrast(&mut copy, 50, 0).unwrap();

        assert_eq!(original.get_pixel(0, 0)[0], 100);
        assert_eq!(copy.get_pixel(0, 0)[0], 150);
    }

    #[test]
    fn transform_layer_keeps_canvas_size() {
        let backend = RustBackend::new();
        let mut img = solid(64, 64, 10);
        backend.transform_layer(&mut img, 141.5, 45.0).unwrap();
        assert_eq!(img.dimensions(), (64, 64));
    }

    #[test]
    fn fill_scale_rotation_leaves_no_background_corners() {
        let backend = RustBackend::new();
        let mut img = solid(100, 100, 10);
        let zoom = crate::imaging::calculations::final_zoom_percent(100.0, 30.0);
        backend.transform_layer(&mut img, zoom, 30.0).unwrap();

        for (x, y) in [(1, 1), (98, 1), (1, 98), (98, 98)] {
            assert!(
                img.get_pixel(x, y)[0] < 128,
                "corner ({x},{y}) exposed background"
            );
        }
    }

    #[test]
    fn unscaled_rotation_exposes_corners() {
        let backend = RustBackend::new();
        let mut img = solid(100, 100, 10);
        backend.transform_layer(&mut img, 100.0, 45.0).unwrap();
        assert_eq!(img.get_pixel(0, 0), &BACKGROUND);
    }

    #[test]
    fn rotate_canvas_grows_to_bounds() {
        let backend = RustBackend::new();
        let mut img = solid(100, 50, 10);
        backend.rotate_canvas(&mut img, 90.0).unwrap();
        assert_eq!(img.dimensions(), (50, 100));

        let mut img = solid(100, 100, 10);
        backend.rotate_canvas(&mut img, 45.0).unwrap();
        assert_eq!(img.dimensions(), (142, 142));
    }

    #[test]
    fn flip_horizontal_mirrors_columns() {
        let backend = RustBackend::new();
        let mut img = RgbaImage::from_fn(4, 1, |x, _| Rgba([x as u8, 0, 0, 255]));
        backend.flip(&mut img, Axis::Horizontal).unwrap();
        assert_eq!(img.get_pixel(0, 0)[0], 3);
        assert_eq!(img.get_pixel(3, 0)[0], 0);
    }

    #[test]
    fn crop_outside_bounds_errors() {
        let backend = RustBackend::new();
        let mut img = solid(10, 10, 0);
        let rect = Rect {
            x: 5,
            y: 0,
            width: 10,
            height: 10,
        };
        assert!(backend.crop(&mut img, rect).is_err());
        assert_eq!(img.dimensions(), (10, 10));
    }

    #[test]
    fn resize_beyond_canvas_limit_errors_without_allocating() {
        let backend = RustBackend::new();
        let mut img = solid(8, 8, 0);
        assert!(backend.resize(&mut img, MAX_EDGE + 1, 8).is_err());
        assert!(backend.resize(&mut img, MAX_EDGE, MAX_EDGE).is_err());
        assert!(backend.resize(&mut img, 0, 8).is_err());
        assert_eq!(img.dimensions(), (8, 8));
    }

    #[test]
    fn oversized_blur_radius_errors() {
        let backend = RustBackend::new();
        let mut img = solid(8, 8, 0);
        assert!(backend.gaussian_blur(&mut img, 1e30).is_err());
        assert!(backend.gaussian_blur(&mut img, f64::NAN).is_err());
        assert!(backend.gaussian_blur(&mut img, 2.0).is_ok());
    }

    #[test]
    fn shear_keeps_size() {
        let backend = RustBackend::new();
        let mut img = solid(40, 30, 10);
        backend.shear(&mut img, 10.0, -5.0).unwrap();
        assert_eq!(img.dimensions(), (40, 30));
    }

    #[test]
    fn noise_is_reproducible_and_keeps_alpha() {
        let backend = RustBackend::new();
        let mut a = solid(32, 32, 128);
        let mut b = solid(32, 32, 128);
        backend.add_noise(&mut a, 5.0, 42).unwrap();
        backend.add_noise(&mut b, 5.0, 42).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, solid(32, 32, 128));
        assert!(a.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn exposure_zero_stops_is_identity() {
        let lut = exposure_lut(0.0);
        for (i, v) in lut.iter().enumerate() {
            assert_eq!(*v as usize, i);
        }
    }

    #[test]
    fn exposure_positive_brightens() {
        let backend = RustBackend::new();
        let mut img = solid(4, 4, 100);
        backend.apply_exposure_and_flatten(&mut img, 1.0).unwrap();
        assert!(img.get_pixel(0, 0)[0] > 100);
        assert_eq!(img.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn fill_rect_paints_only_inside() {
        let backend = RustBackend::new();
        let mut img = solid(10, 10, 200);
        let rect = Rect {
            x: 2,
            y: 3,
            width: 4,
            height: 2,
        };
        backend.fill_rect(&mut img, rect, [0, 0, 0]).unwrap();

        assert_eq!(img.get_pixel(2, 3)[0], 0);
        assert_eq!(img.get_pixel(5, 4)[0], 0);
        assert_eq!(img.get_pixel(6, 4)[0], 200);
        assert_eq!(img.get_pixel(2, 5)[0], 200);
    }

    #[test]
    fn fill_empty_rect_is_noop() {
        let backend = RustBackend::new();
        let mut img = solid(10, 10, 200);
        backend
            .fill_rect(&mut img, Rect::full(0, 10), [0, 0, 0])
            .unwrap();
        assert_eq!(img, solid(10, 10, 200));
    }

    #[test]
    fn encode_every_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = RustBackend::new();
        let img = solid(20, 10, 90);

        for format in [
            OutputFormat::Jpeg,
            OutputFormat::Png,
            OutputFormat::Tiff,
            OutputFormat::Psd,
        ] {
            let path = tmp.path().join(format!("out.{}", format.extension()));
            backend
                .encode_and_save(&img, &path, format, &FormatOptions::default())
                .unwrap();
            assert!(std::fs::metadata(&path).unwrap().len() > 0, "{format} empty");
        }

        let tif = backend.open(&tmp.path().join("out.tif")).unwrap();
        assert_eq!(tif.dimensions(), (20, 10));
    }

    #[test]
    fn png_output_is_lossless() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = RustBackend::new();
        let img = RgbaImage::from_fn(16, 16, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 7, 255]));
        let path = tmp.path().join("out.png");

        backend
            .encode_and_save(&img, &path, OutputFormat::Png, &FormatOptions::default())
            .unwrap();
        assert_eq!(backend.open(&path).unwrap(), img);
    }

    #[test]
    fn png_compression_levels_map_onto_encoder_presets() {
        assert!(matches!(png_compression_type(PngCompression::new(0)), CompressionType::Fast));
        assert!(matches!(png_compression_type(PngCompression::new(6)), CompressionType::Default));
        assert!(matches!(png_compression_type(PngCompression::new(9)), CompressionType::Best));
    }
}
