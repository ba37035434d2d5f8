//! High-level export operations.
//!
//! These functions combine naming with backend execution: given a finished
//! variant and an output stem they plan one file per selected format and hand
//! each one to the backend encoder.

use super::backend::{BackendError, ImageBackend};
use super::params::{FormatOptions, OutputFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Encoding or writing one format of a variant failed.
#[derive(Error, Debug)]
#[error("{format} export to {} failed: {cause}", path.display())]
pub struct ExportError {
    pub format: OutputFormat,
    pub path: PathBuf,
    #[source]
    pub cause: BackendError,
}

/// Plan the output files for one variant without writing anything.
///
/// Formats are deduplicated and kept in their configured order.
pub fn plan_exports(dir: &Path, stem: &str, formats: &[OutputFormat]) -> Vec<(OutputFormat, PathBuf)> {
    let mut planned: Vec<(OutputFormat, PathBuf)> = Vec::with_capacity(formats.len());
    for &format in formats {
        if planned.iter().any(|(f, _)| *f == format) {
            continue;
        }
        planned.push((format, dir.join(format!("{stem}.{}", format.extension()))));
    }
    planned
}

/// Write a variant once per selected format.
///
/// Stops at the first failing format; files already written stay on disk.
/// Returns the written paths in format order.
pub fn export_variant<B: ImageBackend>(
    backend: &B,
    handle: &B::Handle,
    dir: &Path,
    stem: &str,
    formats: &[OutputFormat],
    options: &FormatOptions,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();
    for (format, path) in plan_exports(dir, stem, formats) {
        backend
            .encode_and_save(handle, &path, format, options)
            .map_err(|cause| ExportError {
                format,
                path: path.clone(),
                cause,
            })?;
        written.push(path);
    }
    Ok(written)
}
