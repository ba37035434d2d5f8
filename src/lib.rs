//! # Augmentor
//!
//! Batch image augmentation for building training-image datasets. Given one
//! or more source photos it writes N transformed variants of each, applying
//! an ordered set of geometric and photometric steps, in one or more raster
//! formats, under collision-free names.
//!
//! # Architecture: Two-Stage Batch
//!
//! ```text
//! 1. Scan      source path  →  ordered source files   (file or folder walk)
//! 2. Process   sources      →  destination/           (decode → steps → export, per copy)
//! ```
//!
//! Configuration is resolved completely before stage 1 starts. Only
//! configuration and discovery problems are fatal; anything that goes wrong
//! with one (file, copy) pair is recorded and the batch continues.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Tool presets, `augment.toml` loading, layering, and validation |
//! | [`steps`] | Step registry: the eleven step kinds, their parameters, and parsing into typed steps |
//! | [`pipeline`] | Applies typed steps to one image through the backend, in fixed order |
//! | [`scan`] | Stage 1: discovers source images |
//! | [`process`] | Stage 2: per-(file, copy) lifecycle, failure isolation, parallelism |
//! | [`naming`] | Output folders and file names (tagged and sequence schemes) |
//! | [`imaging`] | Geometry (fill-scale law, crop and cutout rectangles), the backend trait, and the pure-Rust backend |
//! | [`output`] | CLI output formatting: progress, summary, `check` listing |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Fixed Step Order
//!
//! Steps always run in the same order, whatever the configuration file says:
//! resize, crop, rotate, flips, shear, blur, noise, brightness, exposure,
//! cutout. Shape-changing steps come first so the photometric ones, and the
//! cutout rectangle in particular, see the final geometry. Any subset of steps
//! can be enabled without changing the order of the rest.
//!
//! ## Fill-Scale Rotation
//!
//! Rotating an image inside its own frame leaves empty corners. The dataset
//! creator avoids them by zooming by `|cos θ| + |sin θ|` together with the
//! rotation (see [`imaging::fill_scale_factor`]). The law is exact for square
//! images; other shapes get the same factor.
//!
//! ## Backend Trait
//!
//! Every pixel operation goes through [`imaging::ImageBackend`]. The pipeline
//! and the orchestrator only ever see an opaque handle, which makes the whole
//! batch logic testable with a recording mock that never decodes a pixel.
//!
//! ## Bad Parameters Disable a Step, Not the Run
//!
//! An enabled step with an unparseable or out-of-range parameter is dropped
//! from the pipeline with a warning and listed in the run summary. The rest of
//! the batch runs as configured.

pub mod config;
pub mod imaging;
pub mod logging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod scan;
pub mod steps;
