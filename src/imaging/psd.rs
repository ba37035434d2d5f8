//! Minimal Photoshop document writer.
//!
//! Writes a flat 8-bit RGB document: header, empty color-mode, resource and
//! layer sections, then raw (uncompressed) planar image data. Photoshop and
//! GIMP open it as a single background layer.

use super::backend::BackendError;
use image::RgbaImage;
use std::io::Write;
use std::path::Path;

/// Largest edge the version-1 format allows.
pub const MAX_DIMENSION: u32 = 30_000;

const SIGNATURE: &[u8; 4] = b"8BPS";
const VERSION: u16 = 1;
const CHANNELS: u16 = 3;
const DEPTH: u16 = 8;
const COLOR_MODE_RGB: u16 = 3;
const COMPRESSION_RAW: u16 = 0;

/// Serialize `img` as a PSD byte stream. Alpha is dropped.
pub fn encode_psd(img: &RgbaImage) -> Result<Vec<u8>, BackendError> {
    let (width, height) = img.dimensions();
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(BackendError::Unsupported(format!(
            "PSD cannot hold a {width}x{height} image (max {MAX_DIMENSION} px per edge)"
        )));
    }

    let pixels = (width as usize) * (height as usize);
    let mut out = Vec::with_capacity(26 + 12 + 2 + pixels * CHANNELS as usize);

    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&[0u8; 6]);
    out.extend_from_slice(&CHANNELS.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&DEPTH.to_be_bytes());
    out.extend_from_slice(&COLOR_MODE_RGB.to_be_bytes());

    // Color mode data, image resources, layer and mask info: all empty
    for _ in 0..3 {
        out.extend_from_slice(&0u32.to_be_bytes());
    }

    out.extend_from_slice(&COMPRESSION_RAW.to_be_bytes());
    for channel in 0..CHANNELS as usize {
        out.extend(img.pixels().map(|p| p[channel]));
    }

    Ok(out)
}

pub fn write_psd(img: &RgbaImage, path: &Path) -> Result<(), BackendError> {
    let bytes = encode_psd(img)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn header_fields() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let bytes = encode_psd(&img).unwrap();

        assert_eq!(&bytes[0..4], b"8BPS");
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 1);
        assert_eq!(u16::from_be_bytes([bytes[12], bytes[13]]), 3);
        assert_eq!(u32::from_be_bytes(bytes[14..18].try_into().unwrap()), 2);
        assert_eq!(u32::from_be_bytes(bytes[18..22].try_into().unwrap()), 3);
        assert_eq!(u16::from_be_bytes([bytes[22], bytes[23]]), 8);
        assert_eq!(u16::from_be_bytes([bytes[24], bytes[25]]), 3);
    }

    #[test]
    fn image_data_is_planar() {
        let img = RgbaImage::from_fn(2, 1, |x, _| Rgba([10 + x as u8, 20 + x as u8, 30 + x as u8, 255]));
        let bytes = encode_psd(&img).unwrap();

        // 26 header + 3 empty sections + compression flag
        let data = &bytes[26 + 12 + 2..];
        assert_eq!(data, &[10, 11, 20, 21, 30, 31]);
    }

    #[test]
    fn oversized_image_is_unsupported() {
        let img = RgbaImage::new(MAX_DIMENSION + 1, 1);
        assert!(matches!(encode_psd(&img), Err(BackendError::Unsupported(_))));
    }
}
