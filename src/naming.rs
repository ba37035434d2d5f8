//! Output locations and file names.
//!
//! Every variant is written to a folder computed from its source file and a
//! file stem computed from the naming scheme. The format extension is added
//! later, per output format (see [`crate::imaging::plan_exports`]).
//!
//! ## Tagged names
//!
//! `prefix + source stem + suffix`, with `_N` appended when more than one copy
//! is requested:
//! - `cat.jpg`, 1 copy, suffix `_aug` → `cat_aug`
//! - `cat.jpg`, 3 copies, suffix `_aug` → `cat_aug_1`, `cat_aug_2`, `cat_aug_3`
//!
//! Two sources that would share a tagged name in one output folder are told
//! apart by their path relative to the source root, extension included (see
//! [`source_base_names`]):
//! - `a/cat.jpg`, `b/cat.jpg`, flat output → `a_cat_jpg_aug`, `b_cat_jpg_aug`
//! - `cat.jpg`, `cat.png` → `cat_jpg_aug`, `cat_png_aug`
//!
//! ## Sequence names
//!
//! `prefix + zero-padded sequence number`, counted across the whole batch:
//! - `versione_0001`, `versione_0002`, ...

use crate::config::{NamingScheme, OutputConfig};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Folder a variant of `source_file` is written to.
///
/// With `preserve_structure`, the parent folder of `source_file` relative to
/// `source_root` is recreated under `destination_root`. Sources outside the
/// root (or a root that is the file itself) land directly in the destination.
pub fn destination_dir(
    source_root: &Path,
    source_file: &Path,
    destination_root: &Path,
    preserve_structure: bool,
) -> PathBuf {
    if !preserve_structure {
        return destination_root.to_path_buf();
    }
    match source_file
        .parent()
        .and_then(|parent| parent.strip_prefix(source_root).ok())
    {
        Some(relative) => destination_root.join(relative),
        None => destination_root.to_path_buf(),
    }
}

/// `prefix + base_name + suffix`, plus `_copy_index` when `total_copies > 1`.
///
/// `copy_index` is 1-based.
pub fn tagged_file_name(
    prefix: &str,
    base_name: &str,
    suffix: &str,
    copy_index: u32,
    total_copies: u32,
) -> String {
    if total_copies > 1 {
        format!("{prefix}{base_name}{suffix}_{copy_index}")
    } else {
        format!("{prefix}{base_name}{suffix}")
    }
}

/// `prefix + sequence`, zero-padded to `width` digits.
pub fn sequence_file_name(prefix: &str, sequence: u64, width: usize) -> String {
    format!("{prefix}{sequence:0width$}")
}

/// Base name of every source for tagged naming, unique per output folder.
///
/// A source keeps its file stem unless another source lands in the same
/// output folder with the same stem (compared case-insensitively). Those get
/// their path relative to `source_root`, extension included, with separators
/// and dots turned into `_`. Anything still clashing gets the source's 1-based
/// batch position appended.
pub fn source_base_names(source_root: &Path, files: &[PathBuf], preserve_structure: bool) -> Vec<String> {
    let key = |file: &Path, base: &str| {
        (
            destination_dir(source_root, file, Path::new(""), preserve_structure),
            base.to_lowercase(),
        )
    };
    let stems: Vec<String> = files.iter().map(|file| file_stem(file)).collect();

    let mut counts: HashMap<(PathBuf, String), usize> = HashMap::new();
    for (file, stem) in files.iter().zip(&stems) {
        *counts.entry(key(file, stem)).or_default() += 1;
    }

    let mut taken = HashSet::new();
    files
        .iter()
        .zip(stems)
        .enumerate()
        .map(|(index, (file, stem))| {
            let mut base = if counts[&key(file, &stem)] > 1 {
                qualified_name(source_root, file, preserve_structure)
            } else {
                stem
            };
            while !taken.insert(key(file, &base)) {
                base = format!("{base}_{}", index + 1);
            }
            base
        })
        .collect()
}

fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `a/cat.jpg` → `a_cat_jpg`. With structure preserved the folder already
/// tells sources apart, so only the file name is used.
fn qualified_name(source_root: &Path, file: &Path, preserve_structure: bool) -> String {
    let relative = match file.strip_prefix(source_root) {
        Ok(relative) if !preserve_structure && !relative.as_os_str().is_empty() => relative,
        _ => Path::new(file.file_name().unwrap_or(file.as_os_str())),
    };
    relative
        .iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join("_")
        .replace('.', "_")
}

/// File stem of one variant under the configured scheme.
///
/// `base_name` comes from [`source_base_names`]. `file_index` is the 0-based
/// position of the source in the batch and `copy_index` the 1-based copy
/// number; sequence numbers are `file_index * copies + copy_index`, so they
/// never collide across sources.
pub fn variant_stem(output: &OutputConfig, base_name: &str, file_index: usize, copy_index: u32) -> String {
    match output.naming {
        NamingScheme::Tagged => {
            tagged_file_name(
                &output.prefix,
                base_name,
                &output.suffix,
                copy_index,
                output.copies,
            )
        }
        NamingScheme::Sequence => {
            let sequence = file_index as u64 * u64::from(output.copies) + u64::from(copy_index);
            sequence_file_name(&output.prefix, sequence, output.sequence_width)
        }
    }
}
