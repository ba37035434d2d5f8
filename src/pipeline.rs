//! Pipeline runner.
//!
//! Applies an ordered list of [`PipelineStep`]s to one open image through an
//! [`ImageBackend`]. The runner owns no image state: the caller hands in the
//! handle by exclusive borrow and the random source every randomized step
//! draws from, so a seeded source gives a reproducible variant.

use crate::imaging::{
    Axis, BackendError, ImageBackend, Rect, crop_rect_for_ratio, cutout_rect, final_zoom_percent,
    resize_dimensions,
};
use crate::steps::{FlipPolicy, PipelineStep, RotateMode, StepKind};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Cutout fill color.
const CUTOUT_RGB: [u8; 3] = [0, 0, 0];

/// A backend call failed while applying a step.
#[derive(Error, Debug)]
#[error("{kind} step failed: {cause}")]
pub struct StepFailure {
    pub kind: StepKind,
    #[source]
    pub cause: BackendError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    /// The step's parameters (or its coin flip) made it a no-op.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub kind: StepKind,
    pub outcome: StepOutcome,
}

/// Enabled steps in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Sorts `steps` into slot order; configuration order is irrelevant.
    pub fn new(mut steps: Vec<PipelineStep>) -> Self {
        steps.sort_by_key(PipelineStep::kind);
        Self { steps }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step against `handle`, stopping at the first failure.
    pub fn run<B: ImageBackend, R: Rng + ?Sized>(
        &self,
        backend: &B,
        handle: &mut B::Handle,
        rng: &mut R,
    ) -> Result<Vec<StepReport>, StepFailure> {
        let mut reports = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let kind = step.kind();
            let outcome = apply_step(backend, handle, step, rng).map_err(|cause| StepFailure { kind, cause })?;
            debug!(step = %kind, ?outcome, "{step}");
            reports.push(StepReport { kind, outcome });
        }
        Ok(reports)
    }
}

fn applied_if(condition: bool) -> StepOutcome {
    if condition {
        StepOutcome::Applied
    } else {
        StepOutcome::Skipped
    }
}

/// Apply one step. Zero-effect parameters skip the backend call.
pub fn apply_step<B: ImageBackend, R: Rng + ?Sized>(
    backend: &B,
    handle: &mut B::Handle,
    step: &PipelineStep,
    rng: &mut R,
) -> Result<StepOutcome, BackendError> {
    match *step {
        PipelineStep::Resize(size) => {
            let dims = backend.dimensions(handle);
            let (w, h) = resize_dimensions(dims.width, dims.height, size);
            if (w, h) == (dims.width, dims.height) {
                return Ok(StepOutcome::Skipped);
            }
            backend.resize(handle, w, h)?;
            Ok(StepOutcome::Applied)
        }
        PipelineStep::CropToRatio(ratio) => {
            let dims = backend.dimensions(handle);
            let rect = crop_rect_for_ratio(dims.width, dims.height, ratio);
            if rect == Rect::full(dims.width, dims.height) {
                return Ok(StepOutcome::Skipped);
            }
            backend.crop(handle, rect)?;
            Ok(StepOutcome::Applied)
        }
        PipelineStep::Rotate(RotateMode::WithFillScale {
            degrees,
            zoom_percent,
        }) => {
            let degrees = degrees.sample(rng);
            let user_zoom = zoom_percent.sample(rng);
            if degrees == 0.0 && user_zoom == 100.0 {
                return Ok(StepOutcome::Skipped);
            }
            let zoom = final_zoom_percent(user_zoom, degrees);
            debug!(degrees, user_zoom, zoom, "fill-scale rotation");
            backend.transform_layer(handle, zoom, degrees)?;
            Ok(StepOutcome::Applied)
        }
        PipelineStep::Rotate(RotateMode::Canvas { degrees }) => {
            if degrees.rem_euclid(360.0) == 0.0 {
                return Ok(StepOutcome::Skipped);
            }
            backend.rotate_canvas(handle, degrees)?;
            Ok(StepOutcome::Applied)
        }
        PipelineStep::FlipHorizontal(policy) => flip(backend, handle, Axis::Horizontal, policy, rng),
        PipelineStep::FlipVertical(policy) => flip(backend, handle, Axis::Vertical, policy, rng),
        PipelineStep::Shear {
            horizontal,
            vertical,
        } => {
            let active = horizontal != 0.0 || vertical != 0.0;
            if active {
                backend.shear(handle, horizontal, vertical)?;
            }
            Ok(applied_if(active))
        }
        PipelineStep::Blur { radius } => {
            if radius > 0.0 {
                backend.gaussian_blur(handle, radius)?;
            }
            Ok(applied_if(radius > 0.0))
        }
        PipelineStep::Noise { amount } => {
            if amount > 0.0 {
                let seed = rng.next_u64();
                backend.add_noise(handle, amount, seed)?;
            }
            Ok(applied_if(amount > 0.0))
        }
        PipelineStep::Brightness { value } => {
            if value != 0 {
                backend.adjust_brightness_contrast(handle, value, 0)?;
            }
            Ok(applied_if(value != 0))
        }
        PipelineStep::Exposure { stops } => {
            if stops != 0.0 {
                backend.apply_exposure_and_flatten(handle, stops)?;
            }
            Ok(applied_if(stops != 0.0))
        }
        PipelineStep::Cutout { max_percent } => {
            let dims = backend.dimensions(handle);
            let rect = cutout_rect(dims.width, dims.height, max_percent, rng);
            if rect.is_empty() {
                return Ok(StepOutcome::Skipped);
            }
            backend.fill_rect(handle, rect, CUTOUT_RGB)?;
            Ok(StepOutcome::Applied)
        }
    }
}

fn flip<B: ImageBackend, R: Rng + ?Sized>(
    backend: &B,
    handle: &mut B::Handle,
    axis: Axis,
    policy: FlipPolicy,
    rng: &mut R,
) -> Result<StepOutcome, BackendError> {
    let flip = match policy {
        FlipPolicy::Always => true,
        FlipPolicy::Maybe => rng.gen_bool(0.5),
    };
    if flip {
        backend.flip(handle, axis)?;
    }
    Ok(applied_if(flip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{AspectRatio, Dimensions, ResizeSpec};
    use crate::steps::ValueRange;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::rngs::mock::StepRng;
    use std::path::Path;

    fn square_backend(side: u32) -> MockBackend {
        MockBackend::with_dimensions(vec![(
            "/src/a.png",
            Dimensions {
                width: side,
                height: side,
            },
        )])
    }

    /// Operations after the initial open.
    fn transforms(backend: &MockBackend) -> Vec<RecordedOp> {
        backend.get_operations().into_iter().skip(1).collect()
    }

    fn run(backend: &MockBackend, steps: Vec<PipelineStep>, rng: &mut impl Rng) -> Vec<StepReport> {
        let mut handle = backend.open(Path::new("/src/a.png")).unwrap();
        Pipeline::new(steps).run(backend, &mut handle, rng).unwrap()
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn steps_run_in_slot_order_regardless_of_input_order() {
        let backend = square_backend(1000);
        let steps = vec![
            PipelineStep::Cutout { max_percent: 25.0 },
            PipelineStep::Brightness { value: 10 },
            PipelineStep::FlipVertical(FlipPolicy::Always),
            PipelineStep::Resize(ResizeSpec::Percent(50.0)),
            PipelineStep::FlipHorizontal(FlipPolicy::Always),
            PipelineStep::CropToRatio(AspectRatio::new(16.0, 9.0)),
        ];

        let reports = run(&backend, steps, &mut StdRng::seed_from_u64(1));
        let kinds: Vec<StepKind> = reports.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::Resize,
                StepKind::CropToRatio,
                StepKind::FlipHorizontal,
                StepKind::FlipVertical,
                StepKind::Brightness,
                StepKind::Cutout,
            ]
        );

        let ops = transforms(&backend);
        assert_eq!(
            ops[0],
            RecordedOp::Resize {
                width: 500,
                height: 500
            }
        );
        // Crop sees the post-resize geometry
        assert_eq!(
            ops[1],
            RecordedOp::Crop(Rect {
                x: 0,
                y: 109,
                width: 500,
                height: 281
            })
        );
        assert_eq!(ops[2], RecordedOp::Flip(Axis::Horizontal));
        assert_eq!(ops[3], RecordedOp::Flip(Axis::Vertical));
    }

    #[test]
    fn empty_pipeline_touches_nothing() {
        let backend = square_backend(100);
        let reports = run(&backend, vec![], &mut StdRng::seed_from_u64(1));
        assert!(reports.is_empty());
        assert!(transforms(&backend).is_empty());
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    #[test]
    fn fill_scale_rotation_is_one_fused_transform() {
        let backend = square_backend(1000);
        let step = PipelineStep::Rotate(RotateMode::WithFillScale {
            degrees: ValueRange::fixed(15.0),
            zoom_percent: ValueRange::fixed(100.0),
        });
        run(&backend, vec![step], &mut StdRng::seed_from_u64(1));

        let ops = transforms(&backend);
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            RecordedOp::TransformLayer {
                zoom_percent,
                degrees,
            } => {
                assert_eq!(*degrees, 15.0);
                assert!((zoom_percent - 100.0 * 1.5f64.sqrt()).abs() < 1e-9);
            }
            other => panic!("expected TransformLayer, got {other:?}"),
        }
    }

    #[test]
    fn fill_scale_rotation_samples_within_ranges() {
        let step = PipelineStep::Rotate(RotateMode::WithFillScale {
            degrees: ValueRange { min: -15.0, max: 15.0 },
            zoom_percent: ValueRange { min: 100.0, max: 110.0 },
        });
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let backend = square_backend(100);
            run(&backend, vec![step], &mut rng);
            let Some(RecordedOp::TransformLayer {
                zoom_percent,
                degrees,
            }) = transforms(&backend).first().cloned()
            else {
                panic!("no transform recorded");
            };
            assert!((-15.0..=15.0).contains(&degrees));
            assert!(zoom_percent >= 100.0);
            assert!(zoom_percent <= 110.0 * crate::imaging::fill_scale_factor(degrees) + 1e-9);
        }
    }

    #[test]
    fn zero_canvas_rotation_is_skipped() {
        let backend = square_backend(100);
        let reports = run(
            &backend,
            vec![PipelineStep::Rotate(RotateMode::Canvas { degrees: 0.0 })],
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(reports[0].outcome, StepOutcome::Skipped);
        assert!(transforms(&backend).is_empty());
    }

    #[test]
    fn canvas_rotation_changes_later_geometry() {
        let backend = MockBackend::with_dimensions(vec![(
            "/src/a.png",
            Dimensions {
                width: 400,
                height: 200,
            },
        )]);
        run(
            &backend,
            vec![
                PipelineStep::Rotate(RotateMode::Canvas { degrees: 90.0 }),
                PipelineStep::Cutout { max_percent: 100.0 },
            ],
            &mut StepRng::new(u64::MAX, 0),
        );

        let ops = transforms(&backend);
        assert_eq!(ops[0], RecordedOp::RotateCanvas { degrees: 90.0 });
        let RecordedOp::FillRect { rect, .. } = ops[1] else {
            panic!("expected FillRect, got {:?}", ops[1]);
        };
        assert!(rect.x + rect.width <= 200);
        assert!(rect.y + rect.height <= 400);
    }

    // =========================================================================
    // Flips
    // =========================================================================

    #[test]
    fn maybe_flip_follows_the_coin() {
        let step = PipelineStep::FlipHorizontal(FlipPolicy::Maybe);

        let heads = square_backend(10);
        let reports = run(&heads, vec![step], &mut StepRng::new(0, 0));
        assert_eq!(reports[0].outcome, StepOutcome::Applied);

        let tails = square_backend(10);
        let reports = run(&tails, vec![step], &mut StepRng::new(u64::MAX, 0));
        assert_eq!(reports[0].outcome, StepOutcome::Skipped);
        assert!(transforms(&tails).is_empty());
    }

    #[test]
    fn always_flip_ignores_the_coin() {
        let backend = square_backend(10);
        let reports = run(
            &backend,
            vec![PipelineStep::FlipVertical(FlipPolicy::Always)],
            &mut StepRng::new(u64::MAX, 0),
        );
        assert_eq!(reports[0].outcome, StepOutcome::Applied);
    }

    // =========================================================================
    // Photometric steps
    // =========================================================================

    #[test]
    fn zero_parameters_skip_backend_calls() {
        let backend = square_backend(100);
        let reports = run(
            &backend,
            vec![
                PipelineStep::Shear {
                    horizontal: 0.0,
                    vertical: 0.0,
                },
                PipelineStep::Blur { radius: 0.0 },
                PipelineStep::Noise { amount: 0.0 },
                PipelineStep::Brightness { value: 0 },
                PipelineStep::Exposure { stops: 0.0 },
                PipelineStep::Cutout { max_percent: 0.0 },
            ],
            &mut StdRng::seed_from_u64(1),
        );
        assert!(reports.iter().all(|r| r.outcome == StepOutcome::Skipped));
        assert!(transforms(&backend).is_empty());
    }

    #[test]
    fn brightness_keeps_contrast_at_zero() {
        let backend = square_backend(100);
        run(
            &backend,
            vec![PipelineStep::Brightness { value: -40 }],
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(
            transforms(&backend),
            vec![RecordedOp::BrightnessContrast {
                brightness: -40,
                contrast: 0
            }]
        );
    }

    #[test]
    fn noise_seed_comes_from_the_rng() {
        let seed_of = |rng_seed: u64| {
            let backend = square_backend(100);
            run(
                &backend,
                vec![PipelineStep::Noise { amount: 5.0 }],
                &mut StdRng::seed_from_u64(rng_seed),
            );
            match transforms(&backend).first() {
                Some(RecordedOp::Noise { seed, .. }) => *seed,
                other => panic!("expected Noise, got {other:?}"),
            }
        };
        assert_eq!(seed_of(5), seed_of(5));
        assert_ne!(seed_of(5), seed_of(6));
    }

    #[test]
    fn cutout_is_black_and_inside_the_image() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let backend = square_backend(300);
            run(&backend, vec![PipelineStep::Cutout { max_percent: 25.0 }], &mut rng);
            for op in transforms(&backend) {
                if let RecordedOp::FillRect { rect, rgb } = op {
                    assert_eq!(rgb, [0, 0, 0]);
                    assert!(rect.width <= 75 && rect.height <= 75);
                    assert!(rect.x + rect.width <= 300 && rect.y + rect.height <= 300);
                }
            }
        }
    }

    // =========================================================================
    // Failure and determinism
    // =========================================================================

    #[test]
    fn backend_failure_names_the_step() {
        let backend = square_backend(100).failing("blur");
        let mut handle = backend.open(Path::new("/src/a.png")).unwrap();
        let pipeline = Pipeline::new(vec![
            PipelineStep::Blur { radius: 2.0 },
            PipelineStep::Exposure { stops: 1.0 },
        ]);

        let err = pipeline
            .run(&backend, &mut handle, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert_eq!(err.kind, StepKind::Blur);
        // Exposure never ran
        assert!(
            !backend
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Exposure { .. }))
        );
    }

    #[test]
    fn non_random_pipeline_gives_identical_geometry_twice() {
        let steps = vec![
            PipelineStep::Resize(ResizeSpec::Percent(80.0)),
            PipelineStep::CropToRatio(AspectRatio::new(4.0, 3.0)),
            PipelineStep::Rotate(RotateMode::Canvas { degrees: 30.0 }),
        ];
        let final_dims = |seed: u64| {
            let backend = square_backend(640);
            let mut handle = backend.open(Path::new("/src/a.png")).unwrap();
            Pipeline::new(steps.clone())
                .run(&backend, &mut handle, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            backend.dimensions(&handle)
        };
        assert_eq!(final_dims(1), final_dims(2));
    }
}
