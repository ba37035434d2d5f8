//! Augmentation step registry.
//!
//! Declares the eleven step kinds, the slot each one runs in, the parameters
//! each accepts, and turns the loosely typed `[steps.<name>]` config tables
//! into typed [`PipelineStep`] values.
//!
//! ## Execution order
//!
//! | Slot | Step | Key | Random |
//! |------|------|-----|--------|
//! | 1 | Resize | `resize` | no |
//! | 2 | Crop to ratio | `crop_to_ratio` | no |
//! | 3 | Rotate | `rotate` | with ranges |
//! | 4 | Flip horizontal, then vertical | `flip_horizontal`, `flip_vertical` | `policy = "maybe"` |
//! | 5 | Shear | `shear` | no |
//! | 6 | Blur | `blur` | no |
//! | 7 | Noise | `noise` | seed |
//! | 8 | Brightness | `brightness` | no |
//! | 9 | Exposure | `exposure` | no |
//! | 10 | Cutout | `cutout` | yes |
//!
//! Shape-changing steps run before photometric ones no matter how the config
//! file orders its tables.
//!
//! ## Validation
//!
//! Parameters are resolved once, before the batch starts. A step whose
//! parameters don't parse, are out of range, or are unknown is dropped from
//! the run and reported as a [`StepParameterError`]; the rest of the pipeline
//! still runs. Parameters of disabled steps are never read.
//!
//! Every numeric parameter has an upper bound: resize up to 1000% or
//! [`MAX_EDGE`] px per edge, blur up to [`MAX_BLUR_RADIUS`], angles within
//! ±360° and zoom up to 1000%. Targets that are still too large for the
//! canvas budget fail per source in the backend.

use crate::imaging::{AspectRatio, MAX_BLUR_RADIUS, MAX_EDGE, ResizeSpec};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The kinds of augmentation step, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Resize,
    CropToRatio,
    Rotate,
    FlipHorizontal,
    FlipVertical,
    Shear,
    Blur,
    Noise,
    Brightness,
    Exposure,
    Cutout,
}

/// Declared parameter of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Default as written in a config file; `None` means required.
    pub default: Option<&'static str>,
    pub help: &'static str,
}

const fn param(name: &'static str, default: Option<&'static str>, help: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        default,
        help,
    }
}

const RESIZE_PARAMS: &[ParamSpec] = &[param("size", None, "\"50%\", \"800x600\" or a bare percentage")];
const CROP_PARAMS: &[ParamSpec] = &[param("ratio", None, "\"W:H\", e.g. \"1:1\", \"4:3\", \"3:2\", \"16:9\"")];
const ROTATE_PARAMS: &[ParamSpec] = &[
    param("mode", Some("\"canvas\""), "\"canvas\" grows the canvas, \"fill\" zooms to hide corners"),
    param("degrees", Some("0"), "fixed angle"),
    param("min_degrees", None, "lower bound of a random angle"),
    param("max_degrees", None, "upper bound of a random angle"),
    param("zoom", Some("100"), "fixed zoom percent (fill mode)"),
    param("min_zoom", None, "lower bound of a random zoom percent (fill mode)"),
    param("max_zoom", None, "upper bound of a random zoom percent (fill mode)"),
];
const FLIP_PARAMS: &[ParamSpec] = &[param("policy", Some("\"always\""), "\"always\" or \"maybe\" (50% chance)")];
const SHEAR_PARAMS: &[ParamSpec] = &[
    param("horizontal", Some("5"), "horizontal skew in degrees, |a| < 90"),
    param("vertical", Some("0"), "vertical skew in degrees, |a| < 90"),
];
const BLUR_PARAMS: &[ParamSpec] = &[param("radius", Some("1.5"), "Gaussian radius in pixels")];
const NOISE_PARAMS: &[ParamSpec] = &[param("amount", Some("5"), "Gaussian noise amount, 0-400 %")];
const BRIGHTNESS_PARAMS: &[ParamSpec] = &[param("value", Some("10"), "integer offset, -150 to 150")];
const EXPOSURE_PARAMS: &[ParamSpec] = &[param("stops", Some("0.2"), "exposure in stops, -20 to 20")];
const CUTOUT_PARAMS: &[ParamSpec] = &[param("max_size", Some("25"), "largest cutout edge, % of the image edge")];

impl StepKind {
    pub const ALL: [StepKind; 11] = [
        StepKind::Resize,
        StepKind::CropToRatio,
        StepKind::Rotate,
        StepKind::FlipHorizontal,
        StepKind::FlipVertical,
        StepKind::Shear,
        StepKind::Blur,
        StepKind::Noise,
        StepKind::Brightness,
        StepKind::Exposure,
        StepKind::Cutout,
    ];

    /// Table name under `[steps]`.
    pub fn key(self) -> &'static str {
        match self {
            StepKind::Resize => "resize",
            StepKind::CropToRatio => "crop_to_ratio",
            StepKind::Rotate => "rotate",
            StepKind::FlipHorizontal => "flip_horizontal",
            StepKind::FlipVertical => "flip_vertical",
            StepKind::Shear => "shear",
            StepKind::Blur => "blur",
            StepKind::Noise => "noise",
            StepKind::Brightness => "brightness",
            StepKind::Exposure => "exposure",
            StepKind::Cutout => "cutout",
        }
    }

    /// Execution slot, 1-based. Both flips share slot 4.
    pub fn slot(self) -> u8 {
        match self {
            StepKind::Resize => 1,
            StepKind::CropToRatio => 2,
            StepKind::Rotate => 3,
            StepKind::FlipHorizontal | StepKind::FlipVertical => 4,
            StepKind::Shear => 5,
            StepKind::Blur => 6,
            StepKind::Noise => 7,
            StepKind::Brightness => 8,
            StepKind::Exposure => 9,
            StepKind::Cutout => 10,
        }
    }

    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            StepKind::Resize => RESIZE_PARAMS,
            StepKind::CropToRatio => CROP_PARAMS,
            StepKind::Rotate => ROTATE_PARAMS,
            StepKind::FlipHorizontal | StepKind::FlipVertical => FLIP_PARAMS,
            StepKind::Shear => SHEAR_PARAMS,
            StepKind::Blur => BLUR_PARAMS,
            StepKind::Noise => NOISE_PARAMS,
            StepKind::Brightness => BRIGHTNESS_PARAMS,
            StepKind::Exposure => EXPOSURE_PARAMS,
            StepKind::Cutout => CUTOUT_PARAMS,
        }
    }

    /// Whether the step can consume randomness with some configuration.
    pub fn can_be_random(self) -> bool {
        matches!(
            self,
            StepKind::Rotate
                | StepKind::FlipHorizontal
                | StepKind::FlipVertical
                | StepKind::Noise
                | StepKind::Cutout
        )
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A step parameter was rejected; the step is disabled for the run.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("steps.{step}: {message}")]
pub struct StepParameterError {
    pub step: StepKind,
    pub message: String,
}

// =============================================================================
// Typed steps
// =============================================================================

/// Inclusive range a value is drawn from. A degenerate range is a fixed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn fixed(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    /// Draw a value. Fixed ranges don't touch the random source.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.is_fixed() {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotateMode {
    /// Zoom by the fill-scale factor and rotate the content; canvas unchanged.
    WithFillScale {
        degrees: ValueRange,
        zoom_percent: ValueRange,
    },
    /// Rotate the canvas itself, enlarging it to the rotated bounds.
    Canvas { degrees: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipPolicy {
    Always,
    /// Independent 50% chance per variant.
    Maybe,
}

/// One resolved step with typed parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineStep {
    Resize(ResizeSpec),
    CropToRatio(AspectRatio),
    Rotate(RotateMode),
    FlipHorizontal(FlipPolicy),
    FlipVertical(FlipPolicy),
    Shear { horizontal: f64, vertical: f64 },
    Blur { radius: f64 },
    Noise { amount: f64 },
    Brightness { value: i32 },
    Exposure { stops: f64 },
    Cutout { max_percent: f64 },
}

impl PipelineStep {
    pub fn kind(&self) -> StepKind {
        match self {
            PipelineStep::Resize(_) => StepKind::Resize,
            PipelineStep::CropToRatio(_) => StepKind::CropToRatio,
            PipelineStep::Rotate(_) => StepKind::Rotate,
            PipelineStep::FlipHorizontal(_) => StepKind::FlipHorizontal,
            PipelineStep::FlipVertical(_) => StepKind::FlipVertical,
            PipelineStep::Shear { .. } => StepKind::Shear,
            PipelineStep::Blur { .. } => StepKind::Blur,
            PipelineStep::Noise { .. } => StepKind::Noise,
            PipelineStep::Brightness { .. } => StepKind::Brightness,
            PipelineStep::Exposure { .. } => StepKind::Exposure,
            PipelineStep::Cutout { .. } => StepKind::Cutout,
        }
    }

    /// Whether running this step consumes randomness.
    pub fn is_random(&self) -> bool {
        match self {
            PipelineStep::Rotate(RotateMode::WithFillScale {
                degrees,
                zoom_percent,
            }) => !degrees.is_fixed() || !zoom_percent.is_fixed(),
            PipelineStep::FlipHorizontal(policy) | PipelineStep::FlipVertical(policy) => {
                *policy == FlipPolicy::Maybe
            }
            PipelineStep::Noise { amount } => *amount > 0.0,
            PipelineStep::Cutout { max_percent } => *max_percent > 0.0,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Resize(ResizeSpec::Percent(p)) => write!(f, "resize {p}%"),
            PipelineStep::Resize(ResizeSpec::Exact { width, height }) => {
                write!(f, "resize {width}x{height}")
            }
            PipelineStep::CropToRatio(ratio) => write!(f, "crop to {ratio}"),
            PipelineStep::Rotate(RotateMode::Canvas { degrees }) => {
                write!(f, "rotate canvas {degrees}°")
            }
            PipelineStep::Rotate(RotateMode::WithFillScale {
                degrees,
                zoom_percent,
            }) => write!(
                f,
                "rotate {}° with fill-scale, zoom {}%",
                format_range(degrees),
                format_range(zoom_percent)
            ),
            PipelineStep::FlipHorizontal(policy) => write!(f, "flip horizontal ({})", policy_label(*policy)),
            PipelineStep::FlipVertical(policy) => write!(f, "flip vertical ({})", policy_label(*policy)),
            PipelineStep::Shear {
                horizontal,
                vertical,
            } => write!(f, "shear {horizontal}°/{vertical}°"),
            PipelineStep::Blur { radius } => write!(f, "blur {radius}px"),
            PipelineStep::Noise { amount } => write!(f, "noise {amount}%"),
            PipelineStep::Brightness { value } => write!(f, "brightness {value:+}"),
            PipelineStep::Exposure { stops } => write!(f, "exposure {stops:+} stops"),
            PipelineStep::Cutout { max_percent } => write!(f, "cutout up to {max_percent}%"),
        }
    }
}

fn format_range(range: &ValueRange) -> String {
    if range.is_fixed() {
        format!("{}", range.min)
    } else {
        format!("{}..{}", range.min, range.max)
    }
}

fn policy_label(policy: FlipPolicy) -> &'static str {
    match policy {
        FlipPolicy::Always => "always",
        FlipPolicy::Maybe => "50%",
    }
}

// =============================================================================
// Config tables
// =============================================================================

/// A raw parameter value as written in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One `[steps.<name>]` table: an enable flag plus free-form parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDefinition {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: BTreeMap<String, ParamValue>,
}

impl StepDefinition {
    pub fn enabled(params: impl IntoIterator<Item = (&'static str, ParamValue)>) -> Self {
        Self {
            enabled: true,
            params: params.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    pub fn disabled(params: impl IntoIterator<Item = (&'static str, ParamValue)>) -> Self {
        Self {
            enabled: false,
            ..Self::enabled(params)
        }
    }
}

/// All eleven step tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepsConfig {
    pub resize: StepDefinition,
    pub crop_to_ratio: StepDefinition,
    pub rotate: StepDefinition,
    pub flip_horizontal: StepDefinition,
    pub flip_vertical: StepDefinition,
    pub shear: StepDefinition,
    pub blur: StepDefinition,
    pub noise: StepDefinition,
    pub brightness: StepDefinition,
    pub exposure: StepDefinition,
    pub cutout: StepDefinition,
}

/// Outcome of resolving a [`StepsConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSteps {
    /// Enabled, valid steps in execution order.
    pub steps: Vec<PipelineStep>,
    /// Enabled steps that were dropped, with the reason.
    pub rejected: Vec<StepParameterError>,
}

impl StepsConfig {
    pub fn definition(&self, kind: StepKind) -> &StepDefinition {
        match kind {
            StepKind::Resize => &self.resize,
            StepKind::CropToRatio => &self.crop_to_ratio,
            StepKind::Rotate => &self.rotate,
            StepKind::FlipHorizontal => &self.flip_horizontal,
            StepKind::FlipVertical => &self.flip_vertical,
            StepKind::Shear => &self.shear,
            StepKind::Blur => &self.blur,
            StepKind::Noise => &self.noise,
            StepKind::Brightness => &self.brightness,
            StepKind::Exposure => &self.exposure,
            StepKind::Cutout => &self.cutout,
        }
    }

    pub fn definition_mut(&mut self, kind: StepKind) -> &mut StepDefinition {
        match kind {
            StepKind::Resize => &mut self.resize,
            StepKind::CropToRatio => &mut self.crop_to_ratio,
            StepKind::Rotate => &mut self.rotate,
            StepKind::FlipHorizontal => &mut self.flip_horizontal,
            StepKind::FlipVertical => &mut self.flip_vertical,
            StepKind::Shear => &mut self.shear,
            StepKind::Blur => &mut self.blur,
            StepKind::Noise => &mut self.noise,
            StepKind::Brightness => &mut self.brightness,
            StepKind::Exposure => &mut self.exposure,
            StepKind::Cutout => &mut self.cutout,
        }
    }

    /// Resolve every enabled step. Never fails as a whole.
    pub fn resolve(&self) -> ResolvedSteps {
        let mut resolved = ResolvedSteps::default();
        for kind in StepKind::ALL {
            let definition = self.definition(kind);
            if !definition.enabled {
                continue;
            }
            match resolve_step(kind, &definition.params) {
                Ok(step) => resolved.steps.push(step),
                Err(e) => resolved.rejected.push(e),
            }
        }
        resolved
    }
}

// =============================================================================
// Parameter parsing
// =============================================================================

const MAX_RESIZE_PERCENT: f64 = 1000.0;
const MAX_DEGREES: f64 = 360.0;
const MAX_ZOOM_PERCENT: f64 = 1000.0;

struct Params<'a> {
    kind: StepKind,
    map: &'a BTreeMap<String, ParamValue>,
}

impl Params<'_> {
    fn error(&self, message: impl Into<String>) -> StepParameterError {
        StepParameterError {
            step: self.kind,
            message: message.into(),
        }
    }

    fn reject_unknown(&self) -> Result<(), StepParameterError> {
        let known = self.kind.params();
        match self.map.keys().find(|k| !known.iter().any(|p| p.name == k.as_str())) {
            Some(unknown) => Err(self.error(format!("unknown parameter `{unknown}`"))),
            None => Ok(()),
        }
    }

    fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    fn number(&self, name: &str) -> Result<Option<f64>, StepParameterError> {
        let value = match self.map.get(name) {
            None => return Ok(None),
            Some(ParamValue::Number(n)) => *n,
            Some(ParamValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.error(format!("`{name}` must be a number, got \"{s}\"")))?,
        };
        if !value.is_finite() {
            return Err(self.error(format!("`{name}` must be finite")));
        }
        Ok(Some(value))
    }

    fn number_or(&self, name: &str, default: f64) -> Result<f64, StepParameterError> {
        Ok(self.number(name)?.unwrap_or(default))
    }

    fn text(&self, name: &str) -> Option<String> {
        self.map.get(name).map(|v| match v {
            ParamValue::Number(n) => n.to_string(),
            ParamValue::Text(s) => s.trim().to_string(),
        })
    }

    fn require_text(&self, name: &str) -> Result<String, StepParameterError> {
        self.text(name)
            .ok_or_else(|| self.error(format!("missing required parameter `{name}`")))
    }

    fn in_range(&self, name: &str, value: f64, min: f64, max: f64) -> Result<f64, StepParameterError> {
        if value < min || value > max {
            return Err(self.error(format!("`{name}` = {value} is outside {min}..={max}")));
        }
        Ok(value)
    }

    /// Either a fixed `name` or a `min_name`/`max_name` pair.
    fn range(&self, name: &str, default: f64) -> Result<ValueRange, StepParameterError> {
        let min_key = format!("min_{name}");
        let max_key = format!("max_{name}");
        let (min, max) = (self.number(&min_key)?, self.number(&max_key)?);

        if min.is_none() && max.is_none() {
            return Ok(ValueRange::fixed(self.number_or(name, default)?));
        }
        if self.has(name) {
            return Err(self.error(format!(
                "give either `{name}` or `{min_key}`/`{max_key}`, not both"
            )));
        }
        match (min, max) {
            (Some(min), Some(max)) if min <= max => Ok(ValueRange { min, max }),
            (Some(min), Some(max)) => Err(self.error(format!("`{min_key}` ({min}) exceeds `{max_key}` ({max})"))),
            _ => Err(self.error(format!("`{min_key}` and `{max_key}` must be given together"))),
        }
    }

    /// [`Params::range`] with both ends inside `lo..=hi`.
    fn bounded_range(&self, name: &str, default: f64, lo: f64, hi: f64) -> Result<ValueRange, StepParameterError> {
        let range = self.range(name, default)?;
        let key = |prefix: &str| {
            if range.is_fixed() {
                name.to_string()
            } else {
                format!("{prefix}{name}")
            }
        };
        self.in_range(&key("min_"), range.min, lo, hi)?;
        self.in_range(&key("max_"), range.max, lo, hi)?;
        Ok(range)
    }
}

fn resolve_step(kind: StepKind, map: &BTreeMap<String, ParamValue>) -> Result<PipelineStep, StepParameterError> {
    let p = Params { kind, map };
    p.reject_unknown()?;

    match kind {
        StepKind::Resize => {
            let size = p.require_text("size")?;
            let parsed = parse_resize(&size)
                .ok_or_else(|| p.error(format!("invalid `size` \"{size}\", expected \"50%\" or \"800x600\"")))?;
            match parsed {
                ResizeSpec::Percent(percent) if percent > MAX_RESIZE_PERCENT => Err(p.error(format!(
                    "`size` {percent}% is above {MAX_RESIZE_PERCENT}%"
                ))),
                ResizeSpec::Exact { width, height } if width > MAX_EDGE || height > MAX_EDGE => Err(p.error(
                    format!("`size` {width}x{height} has an edge above {MAX_EDGE} px"),
                )),
                _ => Ok(PipelineStep::Resize(parsed)),
            }
        }
        StepKind::CropToRatio => {
            let ratio = p.require_text("ratio")?;
            parse_ratio(&ratio)
                .map(PipelineStep::CropToRatio)
                .ok_or_else(|| p.error(format!("invalid `ratio` \"{ratio}\", expected \"W:H\"")))
        }
        StepKind::Rotate => resolve_rotate(&p).map(PipelineStep::Rotate),
        StepKind::FlipHorizontal => resolve_flip(&p).map(PipelineStep::FlipHorizontal),
        StepKind::FlipVertical => resolve_flip(&p).map(PipelineStep::FlipVertical),
        StepKind::Shear => {
            let horizontal = p.number_or("horizontal", 5.0)?;
            let vertical = p.number_or("vertical", 0.0)?;
            for (name, angle) in [("horizontal", horizontal), ("vertical", vertical)] {
                if angle.abs() >= 90.0 {
                    return Err(p.error(format!("`{name}` = {angle} must be strictly between -90 and 90")));
                }
            }
            Ok(PipelineStep::Shear {
                horizontal,
                vertical,
            })
        }
        StepKind::Blur => {
            let radius = p.number_or("radius", 1.5)?;
            Ok(PipelineStep::Blur {
                radius: p.in_range("radius", radius, 0.0, MAX_BLUR_RADIUS)?,
            })
        }
        StepKind::Noise => {
            let amount = p.number_or("amount", 5.0)?;
            Ok(PipelineStep::Noise {
                amount: p.in_range("amount", amount, 0.0, 400.0)?,
            })
        }
        StepKind::Brightness => {
            let value = p.number_or("value", 10.0)?.trunc();
            Ok(PipelineStep::Brightness {
                value: p.in_range("value", value, -150.0, 150.0)? as i32,
            })
        }
        StepKind::Exposure => {
            let stops = p.number_or("stops", 0.2)?;
            Ok(PipelineStep::Exposure {
                stops: p.in_range("stops", stops, -20.0, 20.0)?,
            })
        }
        StepKind::Cutout => {
            let max_percent = p.number_or("max_size", 25.0)?;
            Ok(PipelineStep::Cutout {
                max_percent: p.in_range("max_size", max_percent, 0.0, 100.0)?,
            })
        }
    }
}

fn resolve_rotate(p: &Params<'_>) -> Result<RotateMode, StepParameterError> {
    let mode = p.text("mode").unwrap_or_else(|| "canvas".to_string());
    match mode.to_ascii_lowercase().as_str() {
        "canvas" => {
            if ["min_degrees", "max_degrees", "zoom", "min_zoom", "max_zoom"]
                .iter()
                .any(|k| p.has(k))
            {
                return Err(p.error("canvas rotation takes a fixed `degrees` and no zoom"));
            }
            let degrees = p.number_or("degrees", 0.0)?;
            Ok(RotateMode::Canvas {
                degrees: p.in_range("degrees", degrees, -MAX_DEGREES, MAX_DEGREES)?,
            })
        }
        "fill" => {
            let degrees = p.bounded_range("degrees", 0.0, -MAX_DEGREES, MAX_DEGREES)?;
            let zoom_percent = p.bounded_range("zoom", 100.0, 0.0, MAX_ZOOM_PERCENT)?;
            if zoom_percent.min <= 0.0 {
                return Err(p.error("zoom must be greater than 0%"));
            }
            Ok(RotateMode::WithFillScale {
                degrees,
                zoom_percent,
            })
        }
        other => Err(p.error(format!("unknown `mode` \"{other}\", expected \"canvas\" or \"fill\""))),
    }
}

fn resolve_flip(p: &Params<'_>) -> Result<FlipPolicy, StepParameterError> {
    match p.text("policy").as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("always") => Ok(FlipPolicy::Always),
        Some("maybe") => Ok(FlipPolicy::Maybe),
        Some(other) => Err(p.error(format!("unknown `policy` \"{other}\", expected \"always\" or \"maybe\""))),
    }
}

/// Parse `"50%"`, `"50"` or `"800x600"`.
pub fn parse_resize(text: &str) -> Option<ResizeSpec> {
    let text = text.trim();
    if let Some((w, h)) = text.split_once(['x', 'X']) {
        let width: u32 = w.trim().parse().ok()?;
        let height: u32 = h.trim().parse().ok()?;
        return (width >= 1 && height >= 1).then_some(ResizeSpec::Exact { width, height });
    }
    let percent: f64 = text.strip_suffix('%').unwrap_or(text).trim().parse().ok()?;
    (percent.is_finite() && percent > 0.0).then_some(ResizeSpec::Percent(percent))
}

/// Parse `"W:H"` with both terms positive.
pub fn parse_ratio(text: &str) -> Option<AspectRatio> {
    let (w, h) = text.trim().split_once(':')?;
    let width: f64 = w.trim().parse().ok()?;
    let height: f64 = h.trim().parse().ok()?;
    let valid = |v: f64| v.is_finite() && v > 0.0;
    (valid(width) && valid(height)).then_some(AspectRatio::new(width, height))
}
