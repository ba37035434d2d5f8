//! Source discovery.
//!
//! Stage 1 of a batch run: turns the configured source path into the ordered
//! list of image files to augment.
//!
//! - A **file** is a batch of one. Its folder becomes the source root.
//! - A **folder** is walked (recursively or only its top level) for files with
//!   a supported image extension. Hidden entries are skipped.
//!
//! Files are sorted by path so batch order, sequence numbers and seeded
//! randomness are stable between runs.
//!
//! A source path that does not exist or is not a supported image is fatal and
//! reported before any processing starts.

use crate::imaging::supported_input_extensions;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Source is not a supported image: {0}")]
    UnsupportedSource(PathBuf),
    #[error("Cannot read source folder: {0}")]
    Walk(#[from] walkdir::Error),
}

/// The discovered sources of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    /// Folder that preserved output structure is computed relative to.
    pub root: PathBuf,
    /// Image files in batch order.
    pub files: Vec<PathBuf>,
}

impl SourceSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Discover the image files under `source`.
///
/// `exclude` is skipped during the walk, so an output folder nested inside the
/// source folder is never picked up as input. Paths are compared after
/// resolving them, so `photos/out` matches `./photos/out` or its absolute
/// spelling, and an `exclude` that does not exist yet is resolved through its
/// nearest existing ancestor.
pub fn discover_sources(
    source: &Path,
    recursive: bool,
    exclude: Option<&Path>,
) -> Result<SourceSet, ScanError> {
    if !source.exists() {
        return Err(ScanError::SourceNotFound(source.to_path_buf()));
    }

    if source.is_file() {
        if !is_supported_image(source) {
            return Err(ScanError::UnsupportedSource(source.to_path_buf()));
        }
        let root = source.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(SourceSet {
            root,
            files: vec![source.to_path_buf()],
        });
    }

    let excluded = exclude.and_then(resolved_path);
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    let walker = WalkDir::new(source)
        .follow_links(true)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry, excluded.as_deref()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(SourceSet {
        root: source.to_path_buf(),
        files,
    })
}

fn is_skipped(entry: &DirEntry, excluded: Option<&Path>) -> bool {
    if entry.file_name().to_string_lossy().starts_with('.') {
        return true;
    }
    match excluded {
        Some(excluded) if entry.file_type().is_dir() => {
            fs::canonicalize(entry.path()).is_ok_and(|path| path == excluded)
        }
        _ => false,
    }
}

/// Absolute, symlink-free form of `path`. A path that does not exist yet is
/// resolved through its nearest existing ancestor with the rest appended.
fn resolved_path(path: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    absolute.ancestors().find_map(|ancestor| {
        let resolved = fs::canonicalize(ancestor).ok()?;
        let rest = absolute.strip_prefix(ancestor).ok()?;
        Some(if rest.as_os_str().is_empty() {
            resolved
        } else {
            resolved.join(rest)
        })
    })
}

/// Whether `path` has an extension the backend can decode (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| supported_input_extensions().contains(&ext.as_str()))
}
