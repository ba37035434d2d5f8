//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every source is shown by its positional index and file name, with the path
//! relative to the source root as an indented `Source:` line. Variants are
//! listed under their source by copy number with the file names they produced.
//!
//! # Output Format
//!
//! ## Progress
//!
//! ```text
//! [001/003] cat.jpg
//!     Source: trip/cat.jpg
//!     copy 1 → cat_aug_1.jpg, cat_aug_1.png
//!     copy 2 FAILED while transforming: blur step failed: ...
//! ```
//!
//! ## Summary
//!
//! ```text
//! Created 5 variants from 3 sources (10 files)
//!
//! Failures
//!     trip/dog.jpg copy 1: decoding: cannot decode ...
//!
//! Disabled steps
//!     steps.blur: radius must be a number
//! ```
//!
//! ## Check
//!
//! ```text
//! Sources (2 images)
//! 001 cat.jpg
//!     Source: trip/cat.jpg
//! ...
//! Steps
//!     rotate -15..15° with fill-scale, zoom 100..110%
//! Output
//!     10 copies per source → 20 variants as JPEG
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::config::RunConfig;
use crate::process::{BatchEvent, BatchResult, VariantFailure};
use crate::scan::SourceSet;
use crate::steps::{ResolvedSteps, StepParameterError};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn copy_label(copy_index: Option<u32>) -> String {
    match copy_index {
        Some(n) => format!("copy {n}"),
        None => "all copies".to_string(),
    }
}

fn failure_line(failure: &VariantFailure) -> String {
    format!(
        "{} FAILED while {}: {}",
        copy_label(failure.copy_index),
        failure.stage,
        failure.reason
    )
}

fn rejected_lines(rejected: &[StepParameterError]) -> Vec<String> {
    rejected
        .iter()
        .map(|err| format!("{}{}", indent(1), err))
        .collect()
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent, source_root: &Path) -> Vec<String> {
    match event {
        BatchEvent::SourceStarted { index, total, path } => {
            let width = total.to_string().len().max(3);
            let relative = path.strip_prefix(source_root).unwrap_or(path);
            vec![
                format!("[{index:0>width$}/{total:0>width$}] {}", file_name(path)),
                format!("{}Source: {}", indent(1), relative.display()),
            ]
        }
        BatchEvent::VariantWritten {
            copy_index,
            outputs,
            ..
        } => {
            let names: Vec<String> = outputs.iter().map(|p| file_name(p)).collect();
            vec![format!(
                "{}copy {} \u{2192} {}",
                indent(1),
                copy_index,
                names.join(", ")
            )]
        }
        BatchEvent::VariantFailed(failure) => {
            vec![format!("{}{}", indent(1), failure_line(failure))]
        }
    }
}

/// Print a batch progress event to stdout.
pub fn print_batch_event(event: &BatchEvent, source_root: &Path) {
    for line in format_batch_event(event, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the end-of-run summary: totals, then failures and disabled steps.
pub fn format_summary(result: &BatchResult, source_root: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Created {} variants from {} sources ({} files)",
        result.variants_created, result.files_seen, result.files_written
    )];

    if !result.failures.is_empty() {
        lines.push(String::new());
        lines.push("Failures".to_string());
        for failure in &result.failures {
            let relative = failure.file.strip_prefix(source_root).unwrap_or(&failure.file);
            lines.push(format!(
                "{}{} {}: {}: {}",
                indent(1),
                relative.display(),
                copy_label(failure.copy_index),
                failure.stage,
                failure.reason
            ));
        }
    }

    if !result.rejected_steps.is_empty() {
        lines.push(String::new());
        lines.push("Disabled steps".to_string());
        lines.extend(rejected_lines(&result.rejected_steps));
    }

    lines
}

/// Print the run summary to stdout.
pub fn print_summary(result: &BatchResult, source_root: &Path) {
    for line in format_summary(result, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the dry-run listing of the `check` command: sources, the resolved
/// step pipeline and what a run would write.
pub fn format_check(config: &RunConfig, sources: &SourceSet, steps: &ResolvedSteps) -> Vec<String> {
    let mut lines = vec![format!("Sources ({} images)", sources.len())];
    for (i, file) in sources.files.iter().enumerate() {
        let relative = file.strip_prefix(&sources.root).unwrap_or(file);
        lines.push(format!("{} {}", format_index(i + 1), file_name(file)));
        lines.push(format!("{}Source: {}", indent(1), relative.display()));
    }

    lines.push("Steps".to_string());
    if steps.steps.is_empty() {
        lines.push(format!("{}(none, variants are re-encodes)", indent(1)));
    }
    for step in &steps.steps {
        lines.push(format!("{}{}", indent(1), step));
    }
    if !steps.rejected.is_empty() {
        lines.push("Disabled steps".to_string());
        lines.extend(rejected_lines(&steps.rejected));
    }

    let output = &config.output;
    let formats: Vec<String> = output.formats.iter().map(|f| f.to_string()).collect();
    let variants = sources.len() * output.copies as usize;
    lines.push("Output".to_string());
    lines.push(format!(
        "{}{} copies per source \u{2192} {} variants as {}",
        indent(1),
        output.copies,
        variants,
        formats.join(", ")
    ));
    if let Some(destination) = &output.destination {
        lines.push(format!("{}Destination: {}", indent(1), destination.display()));
    }

    lines
}

/// Print the `check` listing to stdout.
pub fn print_check(config: &RunConfig, sources: &SourceSet, steps: &ResolvedSteps) {
    for line in format_check(config, sources, steps) {
        println!("{}", line);
    }
}
