//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the full set of editing capabilities the
//! augmentation pipeline needs from an image host: decode, duplicate, the
//! geometric and photometric operations, encode, and release.
//!
//! Operations take the handle by exclusive borrow and mutate it in place. A
//! handle belongs to exactly one (file, copy) iteration and is released with
//! [`ImageBackend::close`] on both the success and the failure path.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust on top of the
//! `image` and `imageproc` crates.

use super::calculations::Rect;
use super::params::{Axis, FormatOptions, OutputFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Pixel dimensions of an open image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Editing capabilities of an image host.
///
/// Every backend must implement all operations so the pipeline stays
/// backend-agnostic. `Sync` lets one backend serve a rayon pool; handles are
/// `Send` so each worker can own its own.
pub trait ImageBackend: Sync {
    type Handle: Send;

    /// Decode an image from disk.
    fn open(&self, path: &Path) -> Result<Self::Handle, BackendError>;

    /// Independent copy of an open image.
    fn duplicate(&self, handle: &Self::Handle) -> Result<Self::Handle, BackendError>;

    fn dimensions(&self, handle: &Self::Handle) -> Dimensions;

    /// Resample the whole image to exactly `width`×`height`.
    fn resize(&self, handle: &mut Self::Handle, width: u32, height: u32) -> Result<(), BackendError>;

    fn crop(&self, handle: &mut Self::Handle, rect: Rect) -> Result<(), BackendError>;

    /// Scale the content by `zoom_percent` and rotate it by `degrees`, both
    /// about the center, as one transform. The canvas size is unchanged.
    fn transform_layer(
        &self,
        handle: &mut Self::Handle,
        zoom_percent: f64,
        degrees: f64,
    ) -> Result<(), BackendError>;

    /// Rotate the canvas about its center, growing it to the rotated bounds.
    fn rotate_canvas(&self, handle: &mut Self::Handle, degrees: f64) -> Result<(), BackendError>;

    fn flip(&self, handle: &mut Self::Handle, axis: Axis) -> Result<(), BackendError>;

    /// Skew by a horizontal and a vertical angle (degrees) about the center.
    fn shear(
        &self,
        handle: &mut Self::Handle,
        horizontal_degrees: f64,
        vertical_degrees: f64,
    ) -> Result<(), BackendError>;

    fn gaussian_blur(&self, handle: &mut Self::Handle, radius: f64) -> Result<(), BackendError>;

    /// Add Gaussian noise; `seed` makes the noise reproducible.
    fn add_noise(&self, handle: &mut Self::Handle, percent: f64, seed: u64) -> Result<(), BackendError>;

    fn adjust_brightness_contrast(
        &self,
        handle: &mut Self::Handle,
        brightness: i32,
        contrast: i32,
    ) -> Result<(), BackendError>;

    /// Apply an exposure adjustment (in stops) and merge it into the image.
    fn apply_exposure_and_flatten(&self, handle: &mut Self::Handle, stops: f64) -> Result<(), BackendError>;

    /// Fill a rectangle with a solid color.
    fn fill_rect(&self, handle: &mut Self::Handle, rect: Rect, rgb: [u8; 3]) -> Result<(), BackendError>;

    /// Encode the image in `format` and write it to `path`.
    fn encode_and_save(
        &self,
        handle: &Self::Handle,
        path: &Path,
        format: OutputFormat,
        options: &FormatOptions,
    ) -> Result<(), BackendError>;

    /// Release a handle, discarding any changes.
    fn close(&self, handle: Self::Handle) {
        drop(handle);
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::canvas_bounds;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that records operations and tracks geometry without
    /// touching pixels. Uses Mutex (not RefCell) so it is Sync and works with
    /// rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Mutex<HashMap<PathBuf, Dimensions>>,
        pub corrupt: Mutex<Vec<PathBuf>>,
        pub failing_ops: Mutex<Vec<&'static str>>,
        pub failing_formats: Mutex<Vec<OutputFormat>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    /// Open image as the mock sees it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct MockHandle {
        pub source: PathBuf,
        pub width: u32,
        pub height: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Open(String),
        Duplicate(String),
        Resize { width: u32, height: u32 },
        Crop(Rect),
        TransformLayer { zoom_percent: f64, degrees: f64 },
        RotateCanvas { degrees: f64 },
        Flip(Axis),
        Shear { horizontal: f64, vertical: f64 },
        Blur { radius: f64 },
        Noise { percent: f64, seed: u64 },
        BrightnessContrast { brightness: i32, contrast: i32 },
        Exposure { stops: f64 },
        FillRect { rect: Rect, rgb: [u8; 3] },
        Save { path: String, format: OutputFormat, width: u32, height: u32 },
        Close(String),
    }

    /// Default size of any source the mock has not been told about.
    const DEFAULT_DIMENSIONS: Dimensions = Dimensions {
        width: 1000,
        height: 1000,
    };

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(entries: Vec<(&str, Dimensions)>) -> Self {
            let backend = Self::new();
            {
                let mut dims = backend.dimensions.lock().unwrap();
                for (path, d) in entries {
                    dims.insert(PathBuf::from(path), d);
                }
            }
            backend
        }

        /// Mark a path as undecodable.
        pub fn corrupt(self, path: impl Into<PathBuf>) -> Self {
            self.corrupt.lock().unwrap().push(path.into());
            self
        }

        /// Make every call of the named operation fail.
        pub fn failing(self, op: &'static str) -> Self {
            self.failing_ops.lock().unwrap().push(op);
            self
        }

        /// Make encoding in `format` fail.
        pub fn failing_format(self, format: OutputFormat) -> Self {
            self.failing_formats.lock().unwrap().push(format);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn saved_paths(&self) -> Vec<String> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Save { path, .. } => Some(path),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }

        fn check(&self, op: &'static str) -> Result<(), BackendError> {
            if self.failing_ops.lock().unwrap().contains(&op) {
                return Err(BackendError::ProcessingFailed(format!("mock {op} failure")));
            }
            Ok(())
        }
    }

    impl ImageBackend for MockBackend {
        type Handle = MockHandle;

        fn open(&self, path: &Path) -> Result<MockHandle, BackendError> {
            self.record(RecordedOp::Open(path.to_string_lossy().to_string()));
            if self.corrupt.lock().unwrap().iter().any(|p| p == path) {
                return Err(BackendError::Decode {
                    path: path.to_path_buf(),
                    message: "mock corrupt data".to_string(),
                });
            }
            let dims = self
                .dimensions
                .lock()
                .unwrap()
                .get(path)
                .copied()
                .unwrap_or(DEFAULT_DIMENSIONS);
            Ok(MockHandle {
                source: path.to_path_buf(),
                width: dims.width,
                height: dims.height,
            })
        }

        fn duplicate(&self, handle: &MockHandle) -> Result<MockHandle, BackendError> {
            self.record(RecordedOp::Duplicate(handle.source.to_string_lossy().to_string()));
            self.check("duplicate")?;
            Ok(handle.clone())
        }

        fn dimensions(&self, handle: &MockHandle) -> Dimensions {
            Dimensions {
                width: handle.width,
                height: handle.height,
            }
        }

        fn resize(&self, handle: &mut MockHandle, width: u32, height: u32) -> Result<(), BackendError> {
            self.record(RecordedOp::Resize { width, height });
            self.check("resize")?;
            handle.width = width;
            handle.height = height;
            Ok(())
        }

        fn crop(&self, handle: &mut MockHandle, rect: Rect) -> Result<(), BackendError> {
            self.record(RecordedOp::Crop(rect));
            self.check("crop")?;
            handle.width = rect.width;
            handle.height = rect.height;
            Ok(())
        }

        fn transform_layer(
            &self,
            _handle: &mut MockHandle,
            zoom_percent: f64,
            degrees: f64,
        ) -> Result<(), BackendError> {
            self.record(RecordedOp::TransformLayer {
                zoom_percent,
                degrees,
            });
            self.check("transform_layer")
        }

        fn rotate_canvas(&self, handle: &mut MockHandle, degrees: f64) -> Result<(), BackendError> {
            self.record(RecordedOp::RotateCanvas { degrees });
            self.check("rotate_canvas")?;
            let (w, h) = canvas_bounds(handle.width, handle.height, degrees);
            handle.width = w;
            handle.height = h;
            Ok(())
        }

        fn flip(&self, _handle: &mut MockHandle, axis: Axis) -> Result<(), BackendError> {
            self.record(RecordedOp::Flip(axis));
            self.check("flip")
        }

        fn shear(
            &self,
            _handle: &mut MockHandle,
            horizontal_degrees: f64,
            vertical_degrees: f64,
        ) -> Result<(), BackendError> {
            self.record(RecordedOp::Shear {
                horizontal: horizontal_degrees,
                vertical: vertical_degrees,
            });
            self.check("shear")
        }

        fn gaussian_blur(&self, _handle: &mut MockHandle, radius: f64) -> Result<(), BackendError> {
            self.record(RecordedOp::Blur { radius });
            self.check("blur")
        }

        fn add_noise(&self, _handle: &mut MockHandle, percent: f64, seed: u64) -> Result<(), BackendError> {
            self.record(RecordedOp::Noise { percent, seed });
            self.check("noise")
        }

        fn adjust_brightness_contrast(
            &self,
            _handle: &mut MockHandle,
            brightness: i32,
            contrast: i32,
        ) -> Result<(), BackendError> {
            self.record(RecordedOp::BrightnessContrast {
                brightness,
                contrast,
            });
            self.check("brightness")
        }

        fn apply_exposure_and_flatten(&self, _handle: &mut MockHandle, stops: f64) -> Result<(), BackendError> {
            self.record(RecordedOp::Exposure { stops });
            self.check("exposure")
        }

        fn fill_rect(&self, _handle: &mut MockHandle, rect: Rect, rgb: [u8; 3]) -> Result<(), BackendError> {
            self.record(RecordedOp::FillRect { rect, rgb });
            self.check("fill_rect")
        }

        fn encode_and_save(
            &self,
            handle: &MockHandle,
            path: &Path,
            format: OutputFormat,
            _options: &FormatOptions,
        ) -> Result<(), BackendError> {
            if self.failing_formats.lock().unwrap().contains(&format) {
                return Err(BackendError::ProcessingFailed(format!("mock {format} encode failure")));
            }
            self.record(RecordedOp::Save {
                path: path.to_string_lossy().to_string(),
                format,
                width: handle.width,
                height: handle.height,
            });
            Ok(())
        }

        fn close(&self, handle: MockHandle) {
            self.record(RecordedOp::Close(handle.source.to_string_lossy().to_string()));
        }
    }

    #[test]
    fn mock_open_uses_configured_dimensions() {
        let backend = MockBackend::with_dimensions(vec![(
            "/src/a.jpg",
            Dimensions {
                width: 800,
                height: 600,
            },
        )]);

        let handle = backend.open(Path::new("/src/a.jpg")).unwrap();
        assert_eq!(
            backend.dimensions(&handle),
            Dimensions {
                width: 800,
                height: 600
            }
        );

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Open(p) if p == "/src/a.jpg"));
    }

    #[test]
    fn mock_open_corrupt_fails() {
        let backend = MockBackend::new().corrupt("/src/bad.jpg");
        let result = backend.open(Path::new("/src/bad.jpg"));
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn mock_tracks_geometry_through_crop_and_canvas_rotation() {
        let backend = MockBackend::new();
        let mut handle = backend.open(Path::new("/src/a.jpg")).unwrap();

        backend
            .crop(
                &mut handle,
                Rect {
                    x: 0,
                    y: 0,
                    width: 400,
                    height: 300,
                },
            )
            .unwrap();
        backend.rotate_canvas(&mut handle, 90.0).unwrap();

        assert_eq!((handle.width, handle.height), (300, 400));
    }

    #[test]
    fn mock_failing_op_errors_after_recording() {
        let backend = MockBackend::new().failing("blur");
        let mut handle = backend.open(Path::new("/src/a.jpg")).unwrap();

        assert!(backend.gaussian_blur(&mut handle, 2.0).is_err());
        assert!(matches!(
            backend.get_operations().last(),
            Some(RecordedOp::Blur { radius }) if *radius == 2.0
        ));
    }
}
