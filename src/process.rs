//! Batch orchestration.
//!
//! Stage 2 of a run. Takes the discovered sources and, for every
//! (file, copy) pair, decodes a fresh image, runs the step pipeline on it,
//! and exports the variant in every selected format.
//!
//! ## Variant lifecycle
//!
//! ```text
//! Pending → Decoding → Transforming → Exporting → Done
//!              │            │             │
//!              └────────────┴─────────────┴──→ Failed {file, copy, stage, reason}
//! ```
//!
//! A failed variant is recorded and the batch moves on; its image handle is
//! released on every path. Copies never see a previous copy's mutations:
//! each starts from a fresh decode (`reopen`) or a duplicate of the pristine
//! decode (`duplicate`).
//!
//! Only configuration and source discovery problems are fatal, and they are
//! raised before the first image is touched.
//!
//! ## Parallel Processing
//!
//! With `processing.max_processes` other than 1, sources are spread over the
//! global [rayon](https://docs.rs/rayon) pool. Each worker owns its handles and
//! its own random source; per-source outcomes are merged serially, in source
//! order, into the [`BatchResult`].

use crate::config::{ConfigError, CopySource, RunConfig};
use crate::imaging::{FormatOptions, ImageBackend, RustBackend, export_variant};
use crate::naming::{destination_dir, source_base_names, variant_stem};
use crate::pipeline::Pipeline;
use crate::scan::{ScanError, SourceSet, discover_sources};
use crate::steps::StepParameterError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Source error: {0}")]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where in its lifecycle a variant failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decoding,
    Transforming,
    Exporting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Decoding => "decoding",
            Stage::Transforming => "transforming",
            Stage::Exporting => "exporting",
        };
        f.write_str(name)
    }
}

/// One failed variant, or a whole source when `copy_index` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantFailure {
    pub file: PathBuf,
    /// 1-based copy number. `None` when the failure hit every copy at once
    /// (the shared decode of `duplicate` mode, or the output folder).
    pub copy_index: Option<u32>,
    pub stage: Stage,
    pub reason: String,
}

/// Counters and failures of a finished batch. Also the JSON run report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub files_seen: usize,
    pub variants_created: usize,
    /// Image files written, one per variant and format.
    pub files_written: usize,
    pub failures: Vec<VariantFailure>,
    /// Enabled steps that were disabled for the run because of bad parameters.
    pub rejected_steps: Vec<StepParameterError>,
}

impl BatchResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.rejected_steps.is_empty()
    }
}

/// Progress notifications, published while the batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    SourceStarted {
        /// 1-based position in the batch.
        index: usize,
        total: usize,
        path: PathBuf,
    },
    VariantWritten {
        source: PathBuf,
        copy_index: u32,
        outputs: Vec<PathBuf>,
    },
    VariantFailed(VariantFailure),
}

/// Run a batch with the pure Rust backend.
pub fn run_batch(
    config: &RunConfig,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchResult, ProcessError> {
    run_batch_with_backend(&RustBackend::new(), config, events)
}

/// Run a batch using a specific backend (allows testing with mock).
pub fn run_batch_with_backend<B: ImageBackend>(
    backend: &B,
    config: &RunConfig,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchResult, ProcessError> {
    config.validate()?;
    let (Some(source), Some(destination)) = (
        config.source.path.as_deref(),
        config.output.destination.as_deref(),
    ) else {
        return Err(ConfigError::Validation("source and destination are required".into()).into());
    };

    let sources = discover_sources(source, config.source.recursive, Some(destination))?;

    let resolved = config.steps.resolve();
    for rejected in &resolved.rejected {
        warn!(step = %rejected.step, "step disabled: {}", rejected.message);
    }
    let pipeline = Pipeline::new(resolved.steps);

    info!(
        sources = sources.len(),
        copies = config.output.copies,
        steps = pipeline.steps().len(),
        destination = %destination.display(),
        "starting batch"
    );
    fs::create_dir_all(destination)?;
    let base_names = source_base_names(&sources.root, &sources.files, config.output.preserve_structure);

    let batch = Batch {
        backend,
        config,
        pipeline: &pipeline,
        sources: &sources,
        base_names: &base_names,
        destination,
        options: config.output.format_options(),
        events: events.as_ref(),
    };

    let outcomes: Vec<SourceOutcome> = if config.processing.max_processes == 1 {
        sources
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| batch.process_source(index, file))
            .collect()
    } else {
        sources
            .files
            .par_iter()
            .enumerate()
            .map(|(index, file)| batch.process_source(index, file))
            .collect()
    };

    let mut result = BatchResult {
        files_seen: sources.len(),
        rejected_steps: resolved.rejected,
        ..BatchResult::default()
    };
    for outcome in outcomes {
        result.variants_created += outcome.variants_created;
        result.files_written += outcome.files_written;
        result.failures.extend(outcome.failures);
    }

    info!(
        files_seen = result.files_seen,
        variants_created = result.variants_created,
        failures = result.failures.len(),
        "batch finished"
    );
    Ok(result)
}

/// Write the run report as pretty JSON.
pub fn write_report(result: &BatchResult, path: &Path) -> Result<(), ProcessError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(result)?;
    fs::write(path, json)?;
    Ok(())
}

/// Random source of one source file.
///
/// Seeded runs derive a distinct, reproducible stream per source index so the
/// result does not depend on which worker handled which file.
pub fn source_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => {
            StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        }
        None => StdRng::from_entropy(),
    }
}

#[derive(Debug, Default)]
struct SourceOutcome {
    variants_created: usize,
    files_written: usize,
    failures: Vec<VariantFailure>,
}

/// Everything a worker needs to process one source. Shared read-only.
struct Batch<'a, B: ImageBackend> {
    backend: &'a B,
    config: &'a RunConfig,
    pipeline: &'a Pipeline,
    sources: &'a SourceSet,
    /// Tagged-naming base of each source, by batch position.
    base_names: &'a [String],
    destination: &'a Path,
    options: FormatOptions,
    events: Option<&'a Sender<BatchEvent>>,
}

impl<B: ImageBackend> Batch<'_, B> {
    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = self.events {
            tx.send(event).ok();
        }
    }

    fn fail(
        &self,
        outcome: &mut SourceOutcome,
        file: &Path,
        copy_index: Option<u32>,
        stage: Stage,
        reason: String,
    ) {
        warn!(
            file = %file.display(),
            copy = ?copy_index,
            %stage,
            "variant failed: {reason}"
        );
        let failure = VariantFailure {
            file: file.to_path_buf(),
            copy_index,
            stage,
            reason,
        };
        self.emit(BatchEvent::VariantFailed(failure.clone()));
        outcome.failures.push(failure);
    }

    fn process_source(&self, index: usize, file: &Path) -> SourceOutcome {
        let mut outcome = SourceOutcome::default();
        info!(source = %file.display(), "augmenting");
        self.emit(BatchEvent::SourceStarted {
            index: index + 1,
            total: self.sources.len(),
            path: file.to_path_buf(),
        });

        let output = &self.config.output;
        let dir = destination_dir(
            &self.sources.root,
            file,
            self.destination,
            output.preserve_structure,
        );
        if let Err(err) = fs::create_dir_all(&dir) {
            self.fail(&mut outcome, file, None, Stage::Exporting, format!("cannot create {}: {err}", dir.display()));
            return outcome;
        }

        let mut rng = source_rng(self.config.processing.seed, index);
        let copies = 1..=output.copies;

        match self.config.processing.copy_source {
            CopySource::Reopen => {
                for copy in copies {
                    match self.backend.open(file) {
                        Ok(handle) => self.run_variant(&mut outcome, handle, file, index, copy, &dir, &mut rng),
                        Err(err) => self.fail(&mut outcome, file, Some(copy), Stage::Decoding, err.to_string()),
                    }
                }
            }
            CopySource::Duplicate => {
                let pristine = match self.backend.open(file) {
                    Ok(handle) => handle,
                    Err(err) => {
                        self.fail(&mut outcome, file, None, Stage::Decoding, err.to_string());
                        return outcome;
                    }
                };
                for copy in copies {
                    match self.backend.duplicate(&pristine) {
                        Ok(handle) => self.run_variant(&mut outcome, handle, file, index, copy, &dir, &mut rng),
                        Err(err) => self.fail(&mut outcome, file, Some(copy), Stage::Decoding, err.to_string()),
                    }
                }
                self.backend.close(pristine);
            }
        }
        outcome
    }

    /// Transform and export one variant. Always closes `handle`.
    #[allow(clippy::too_many_arguments)]
    fn run_variant(
        &self,
        outcome: &mut SourceOutcome,
        mut handle: B::Handle,
        file: &Path,
        index: usize,
        copy: u32,
        dir: &Path,
        rng: &mut StdRng,
    ) {
        let output = &self.config.output;
        let result = match self.pipeline.run(self.backend, &mut handle, rng) {
            Err(err) => Err((Stage::Transforming, err.to_string())),
            Ok(_) => {
                let stem = variant_stem(output, &self.base_names[index], index, copy);
                export_variant(self.backend, &handle, dir, &stem, &output.formats, &self.options)
                    .map_err(|err| (Stage::Exporting, err.to_string()))
            }
        };
        self.backend.close(handle);

        match result {
            Ok(outputs) => {
                outcome.variants_created += 1;
                outcome.files_written += outputs.len();
                self.emit(BatchEvent::VariantWritten {
                    source: file.to_path_buf(),
                    copy_index: copy,
                    outputs,
                });
            }
            Err((stage, reason)) => self.fail(outcome, file, Some(copy), stage, reason),
        }
    }
}
