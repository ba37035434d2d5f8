//! Run configuration.
//!
//! Handles loading, validating, and layering the settings of one batch run.
//! Configuration is layered: the tool preset is overridden by the user's
//! config file, which is overridden by command-line flags.
//!
//! ## Presets
//!
//! The two tools share every setting and differ only in their defaults:
//!
//! | | `process` | `create` |
//! |---|---|---|
//! | Source | folder, recursive | one file |
//! | Copies | 1 | 10 |
//! | Naming | `prefix + name + suffix (+ _N)` | `prefix + 0001` |
//! | Rotation | fixed canvas rotation | random fill-scale rotation |
//! | Flips | always (when enabled) | 50% chance (when enabled) |
//! | Copy source | re-decode per copy | duplicate one decode |
//! | Format | JPEG quality 10 | JPEG quality 12 |
//!
//! ## Configuration Options
//!
//! ```toml
//! [source]
//! path = "photos"             # File or folder (or use --source)
//! recursive = true            # Descend into subfolders
//!
//! [output]
//! destination = "augmented"   # Output root (or use --output)
//! preserve_structure = true   # Recreate source subfolders under the root
//! copies = 1                  # Variants per source image
//! naming = "tagged"           # "tagged" or "sequence"
//! prefix = ""
//! suffix = "_aug"
//! sequence_width = 4          # Zero padding for "sequence" naming
//! formats = ["jpeg"]          # Any of "jpeg", "png", "tiff", "psd"
//! jpeg_quality = 10           # 1-12
//! png_compression = 6         # 0-9
//!
//! [processing]
//! max_processes = 1           # Parallel sources; 0 = all cores
//! seed = 42                   # Omit for a different run every time
//! copy_source = "reopen"      # "reopen" or "duplicate"
//!
//! [logging]
//! level = "info"
//! format = "text"             # "text" or "json"
//!
//! [steps.blur]
//! enabled = true
//! radius = 1.5
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Sections merge key by key onto the preset, except
//! `[steps.<name>]` tables: a step table in the file replaces the preset's
//! table for that step, so switching a step's mode never inherits stale
//! parameters from the preset.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{FormatOptions, JpegQuality, OutputFormat, PngCompression};
use crate::steps::{ParamValue, StepDefinition, StepsConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which batch tool a run belongs to. Selects the preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Folder batch with fixed transforms and tagged names.
    Processor,
    /// Single-source dataset generator with random fill-scale rotation.
    Creator,
}

/// Settings for one batch run.
///
/// All fields have defaults (the processor preset). Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
    pub steps: StepsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::preset(Tool::Processor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Source image file or folder.
    pub path: Option<PathBuf>,
    /// Descend into subfolders when `path` is a folder.
    pub recursive: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            recursive: true,
        }
    }
}

/// How output file names are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// `prefix + source name + suffix`, plus `_N` when there are several copies.
    Tagged,
    /// `prefix + zero-padded batch-wide sequence number`.
    Sequence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub destination: Option<PathBuf>,
    /// Recreate the source folder layout under `destination`.
    pub preserve_structure: bool,
    /// Variants per source image.
    pub copies: u32,
    pub naming: NamingScheme,
    pub prefix: String,
    pub suffix: String,
    pub sequence_width: usize,
    pub formats: Vec<OutputFormat>,
    /// JPEG quality on the 1-12 scale.
    pub jpeg_quality: u8,
    /// PNG compression level 0-9.
    pub png_compression: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            destination: None,
            preserve_structure: true,
            copies: 1,
            naming: NamingScheme::Tagged,
            prefix: String::new(),
            suffix: "_aug".to_string(),
            sequence_width: 4,
            formats: vec![OutputFormat::Jpeg],
            jpeg_quality: 10,
            png_compression: 6,
        }
    }
}

impl OutputConfig {
    /// Encoder settings. Values are clamped; [`RunConfig::validate`] rejects
    /// out-of-range values before a run gets here.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            jpeg_quality: JpegQuality::new(self.jpeg_quality),
            png_compression: PngCompression::new(self.png_compression),
        }
    }
}

/// Where each copy's starting image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopySource {
    /// Decode the source file again for every copy.
    Reopen,
    /// Decode once per source and duplicate that pristine image per copy.
    Duplicate,
}

/// Parallel processing and randomness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of sources processed in parallel.
    /// `1` is strictly sequential, `0` means one worker per CPU core.
    /// Values larger than the core count are clamped down.
    pub max_processes: usize,
    /// Seed for every random step. Absent means a fresh entropy seed per run.
    pub seed: Option<u64>,
    pub copy_source: CopySource,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: 1,
            seed: None,
            copy_source: CopySource::Reopen,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `0` → use all available cores
/// - `n` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match config.max_processes {
        0 => cores,
        n => n.min(cores),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Command-line values that override the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub copies: Option<u32>,
}

// =============================================================================
// Presets
// =============================================================================

fn step_defaults(flip_policy: &'static str) -> StepsConfig {
    StepsConfig {
        resize: StepDefinition::disabled([("size", ParamValue::from("50%"))]),
        crop_to_ratio: StepDefinition::disabled([("ratio", ParamValue::from("1:1"))]),
        rotate: StepDefinition::enabled([
            ("mode", ParamValue::from("canvas")),
            ("degrees", ParamValue::from(0.0)),
        ]),
        flip_horizontal: StepDefinition::disabled([("policy", ParamValue::from(flip_policy))]),
        flip_vertical: StepDefinition::disabled([("policy", ParamValue::from(flip_policy))]),
        shear: StepDefinition::disabled([
            ("horizontal", ParamValue::from(5.0)),
            ("vertical", ParamValue::from(0.0)),
        ]),
        blur: StepDefinition::disabled([("radius", ParamValue::from(1.5))]),
        noise: StepDefinition::disabled([("amount", ParamValue::from(5.0))]),
        brightness: StepDefinition::disabled([("value", ParamValue::from(10.0))]),
        exposure: StepDefinition::disabled([("stops", ParamValue::from(0.2))]),
        cutout: StepDefinition::disabled([("max_size", ParamValue::from(25.0))]),
    }
}

impl RunConfig {
    /// Stock settings of a tool.
    pub fn preset(tool: Tool) -> Self {
        match tool {
            Tool::Processor => Self {
                source: SourceConfig::default(),
                output: OutputConfig::default(),
                processing: ProcessingConfig::default(),
                logging: LoggingConfig::default(),
                steps: step_defaults("always"),
            },
            Tool::Creator => {
                let mut steps = step_defaults("maybe");
                steps.rotate = StepDefinition::enabled([
                    ("mode", ParamValue::from("fill")),
                    ("min_degrees", ParamValue::from(-15.0)),
                    ("max_degrees", ParamValue::from(15.0)),
                    ("min_zoom", ParamValue::from(100.0)),
                    ("max_zoom", ParamValue::from(110.0)),
                ]);
                Self {
                    source: SourceConfig {
                        path: None,
                        recursive: false,
                    },
                    output: OutputConfig {
                        preserve_structure: false,
                        copies: 10,
                        naming: NamingScheme::Sequence,
                        prefix: "versione_".to_string(),
                        suffix: String::new(),
                        jpeg_quality: 12,
                        ..OutputConfig::default()
                    },
                    processing: ProcessingConfig {
                        copy_source: CopySource::Duplicate,
                        ..ProcessingConfig::default()
                    },
                    logging: LoggingConfig::default(),
                    steps,
                }
            }
        }
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(source) = &overrides.source {
            self.source.path = Some(source.clone());
        }
        if let Some(destination) = &overrides.destination {
            self.output.destination = Some(destination.clone());
        }
        if let Some(recursive) = overrides.recursive {
            self.source.recursive = recursive;
        }
        if let Some(copies) = overrides.copies {
            self.output.copies = copies;
        }
    }

    /// Validate a config for a run: source and destination are set and all
    /// values are within acceptable ranges.
    ///
    /// Step parameters are not checked here: a bad step only disables that
    /// step (see [`StepsConfig::resolve`]).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.is_none() {
            return Err(ConfigError::Validation(
                "source.path is required (set it or pass --source)".into(),
            ));
        }
        if self.output.destination.is_none() {
            return Err(ConfigError::Validation(
                "output.destination is required (set it or pass --output)".into(),
            ));
        }
        self.validate_options()
    }

    /// The creator builds a dataset from one photo; folders go to the processor.
    pub fn validate_source_for(&self, tool: Tool) -> Result<(), ConfigError> {
        match self.source.path.as_deref() {
            Some(source) if tool == Tool::Creator && source.is_dir() => Err(ConfigError::Validation(format!(
                "the creator takes a single image file, but {} is a folder (use `augmentor process` for folders)",
                source.display()
            ))),
            _ => Ok(()),
        }
    }

    /// Range checks only; paths may still be unset.
    pub fn validate_options(&self) -> Result<(), ConfigError> {
        if self.output.copies == 0 {
            return Err(ConfigError::Validation(
                "output.copies must be at least 1".into(),
            ));
        }
        if self.output.formats.is_empty() {
            return Err(ConfigError::Validation(
                "output.formats must not be empty".into(),
            ));
        }
        if !(JpegQuality::MIN..=JpegQuality::MAX).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 1-12".into(),
            ));
        }
        if self.output.png_compression > PngCompression::MAX {
            return Err(ConfigError::Validation(
                "output.png_compression must be 0-9".into(),
            ));
        }
        if self.output.sequence_width == 0 {
            return Err(ConfigError::Validation(
                "output.sequence_width must be at least 1".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the preset of `tool` as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value(tool: Tool) -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RunConfig::preset(tool))?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Layer a user config onto a preset.
///
/// Like [`merge_toml`], except each `[steps.<name>]` table in `overlay`
/// replaces the base table for that step instead of merging into it.
pub fn layer_config(mut base: toml::Value, overlay: toml::Value) -> toml::Value {
    let overlay_steps = overlay.get("steps").and_then(toml::Value::as_table);
    let base_steps = base
        .get_mut("steps")
        .and_then(toml::Value::as_table_mut);
    if let (Some(overlay_steps), Some(base_steps)) = (overlay_steps, base_steps) {
        for name in overlay_steps.keys() {
            base_steps.remove(name);
        }
    }
    merge_toml(base, overlay)
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Layer an optional overlay onto a base value and deserialize the result.
pub fn resolve_config(base: toml::Value, overlay: Option<toml::Value>) -> Result<RunConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => layer_config(base, ov),
        None => base,
    };
    Ok(merged.try_into()?)
}

/// Build the configuration of a run: preset ← config file ← CLI overrides.
///
/// The result is not validated; see [`load_config`].
pub fn layered_config(
    tool: Tool,
    config_file: Option<&Path>,
    overrides: &Overrides,
) -> Result<RunConfig, ConfigError> {
    let base = stock_defaults_value(tool)?;
    let overlay = config_file.map(load_raw_config).transpose()?;
    let mut config = resolve_config(base, overlay)?;
    config.apply_overrides(overrides);
    Ok(config)
}

/// [`layered_config`], then validate the result for a run.
pub fn load_config(
    tool: Tool,
    config_file: Option<&Path>,
    overrides: &Overrides,
) -> Result<RunConfig, ConfigError> {
    let config = layered_config(tool, config_file, overrides)?;
    config.validate()?;
    config.validate_source_for(tool)?;
    Ok(config)
}

/// Returns a fully-commented stock config file for `tool`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml(tool: Tool) -> &'static str {
    match tool {
        Tool::Processor => PROCESSOR_CONFIG_TOML,
        Tool::Creator => CREATOR_CONFIG_TOML,
    }
}

const PROCESSOR_CONFIG_TOML: &str = r##"# augmentor configuration: folder processor
# ===========================================
# All settings are optional. Values shown below are the defaults of
# `augmentor process`. Unknown keys cause an error.
#
# Sections merge key by key onto these defaults. A [steps.<name>] table
# replaces the default table of that step as a whole.

[source]
# Source file or folder. Usually given with --source.
# path = "photos"

# Descend into subfolders.
recursive = true

[output]
# Output root folder. Usually given with --output.
# destination = "augmented"

# Recreate the source subfolders under the output root.
preserve_structure = true

# Variants per source image. With more than one, names get "_1", "_2", ...
copies = 1

# "tagged" = prefix + source name + suffix, "sequence" = prefix + 0001
naming = "tagged"
prefix = ""
suffix = "_aug"

# Zero padding for "sequence" naming.
sequence_width = 4

# Any of "jpeg", "png", "tiff", "psd". One file per format per variant.
formats = ["jpeg"]

# JPEG quality, 1-12.
jpeg_quality = 10

# PNG compression level, 0-9.
png_compression = 6

[processing]
# Sources processed in parallel. 1 = sequential, 0 = one per CPU core.
max_processes = 1

# Seed for every random step. Omit for a different result on every run.
# seed = 42

# "reopen" decodes the source again for each copy,
# "duplicate" decodes once and copies the pristine image.
copy_source = "reopen"

[logging]
# trace, debug, info, warn or error. RUST_LOG overrides this.
level = "info"

# "text" or "json". Logs go to stderr.
format = "text"

# ---------------------------------------------------------------------------
# Steps. They always run in this order, whatever the order in this file.
# ---------------------------------------------------------------------------

# "50%", "800x600", or a bare percentage.
[steps.resize]
enabled = false
size = "50%"

# Centered crop to "W:H", e.g. "1:1", "4:3", "3:2", "16:9".
[steps.crop_to_ratio]
enabled = false
ratio = "1:1"

# mode = "canvas" rotates the canvas by `degrees` and grows it to fit.
# mode = "fill" zooms so no empty corner shows; it takes `degrees` or
# `min_degrees`/`max_degrees`, and `zoom` or `min_zoom`/`max_zoom` (percent).
[steps.rotate]
enabled = true
mode = "canvas"
degrees = 0

# policy = "always" or "maybe" (50% chance per variant).
[steps.flip_horizontal]
enabled = false
policy = "always"

[steps.flip_vertical]
enabled = false
policy = "always"

# Skew angles in degrees, each strictly between -90 and 90.
[steps.shear]
enabled = false
horizontal = 5
vertical = 0

# Gaussian blur radius in pixels.
[steps.blur]
enabled = false
radius = 1.5

# Gaussian noise amount, 0-400 %.
[steps.noise]
enabled = false
amount = 5

# Brightness offset, -150 to 150 (truncated to an integer).
[steps.brightness]
enabled = false
value = 10

# Exposure in stops, -20 to 20.
[steps.exposure]
enabled = false
stops = 0.2

# Black rectangle up to max_size % of each edge, at a random position.
[steps.cutout]
enabled = false
max_size = 25
"##;

const CREATOR_CONFIG_TOML: &str = r##"# augmentor configuration: dataset creator
# ==========================================
# All settings are optional. Values shown below are the defaults of
# `augmentor create`. Unknown keys cause an error.
#
# Sections merge key by key onto these defaults. A [steps.<name>] table
# replaces the default table of that step as a whole.

[source]
# Source image. Usually given with --source.
# path = "photo.jpg"
recursive = false

[output]
# Output folder. Usually given with --output.
# destination = "dataset"
preserve_structure = false

# Number of versions to create.
copies = 10

# Files are named prefix + zero-padded sequence: versione_0001.jpg, ...
naming = "sequence"
prefix = "versione_"
suffix = ""
sequence_width = 4

# Any of "jpeg", "png", "tiff", "psd".
formats = ["jpeg"]
jpeg_quality = 12
png_compression = 6

[processing]
max_processes = 1
# seed = 42

# Decode the source once and duplicate it for every version.
copy_source = "duplicate"

[logging]
level = "info"
format = "text"

# ---------------------------------------------------------------------------
# Steps
# ---------------------------------------------------------------------------

[steps.resize]
enabled = false
size = "50%"

[steps.crop_to_ratio]
enabled = false
ratio = "1:1"

# Random angle and zoom per version; the zoom is raised by the fill-scale
# factor so the rotated image has no empty corners (exact for square images).
[steps.rotate]
enabled = true
mode = "fill"
min_degrees = -15
max_degrees = 15
min_zoom = 100
max_zoom = 110

# Mirror with a 50% chance per version.
[steps.flip_horizontal]
enabled = false
policy = "maybe"

[steps.flip_vertical]
enabled = false
policy = "maybe"

[steps.shear]
enabled = false
horizontal = 5
vertical = 0

[steps.blur]
enabled = false
radius = 1.5

[steps.noise]
enabled = false
amount = 5

[steps.brightness]
enabled = false
value = 10

[steps.exposure]
enabled = false
stops = 0.2

[steps.cutout]
enabled = false
max_size = 25
"##;
