use std::fmt;
use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ParameterSet, validate_dimension};
use crate::error::{LeniaError, LeniaResult};
use crate::field::ActivationField;
use crate::frame::{FrameSink, FrameStats, Generation};
use crate::kernel::{Kernel, KernelBuilder};
use crate::step::GenerationStep;

/// Outcome tag for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Went extinct early.
    Died,
    /// Went extinct late enough to count as a lifecycle.
    Lived,
    /// Still alive after the frame budget.
    Unstable,
    /// Stopped by the mass or frame-time guard.
    TimedOut,
}

impl Classification {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Died => "died",
            Self::Lived => "lived",
            Self::Unstable => "unstable",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the generation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    MassLimit,
    FrameTimeLimit,
    Extinct,
    FrameBudgetExhausted,
}

/// Summary returned by [`RunController::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub classification: Classification,
    /// Frames handed to the sink.
    pub actual_frame_count: u32,
    pub reason: TerminationReason,
    /// Alive cells in the last computed field.
    pub final_cell_count: usize,
    pub final_mass: f64,
}

/// Owns the kernel and live field of a run and drives it to a classification.
#[derive(Debug, Clone)]
pub struct RunController<const D: usize> {
    params: ParameterSet,
    kernel: Kernel<D>,
    field: ActivationField<D>,
}

impl<const D: usize> RunController<D> {
    /// Validate `params`, build the kernel and seed the field with the
    /// RNG configured by `rng_seed`.
    pub fn new(params: ParameterSet) -> LeniaResult<Self> {
        let mut rng = params.seeded_rng();
        Self::with_rng(params, &mut rng)
    }

    /// Like [`Self::new`] but seeds from a caller-supplied RNG.
    pub fn with_rng<R: Rng + ?Sized>(params: ParameterSet, rng: &mut R) -> LeniaResult<Self> {
        let kernel = Self::prepare(&params)?;
        let field = ActivationField::seed(&params, rng);
        Ok(Self::assemble(params, kernel, field))
    }

    /// Start from an explicit field instead of seeding one. Values are
    /// re-inserted under the run's prune threshold.
    pub fn with_field(params: ParameterSet, field: &ActivationField<D>) -> LeniaResult<Self> {
        let kernel = Self::prepare(&params)?;
        let field = ActivationField::from_pairs(params.prune_threshold, field.to_pairs());
        Ok(Self::assemble(params, kernel, field))
    }

    fn prepare(params: &ParameterSet) -> LeniaResult<Kernel<D>> {
        validate_dimension(D)?;
        params.validate()?;
        KernelBuilder::from_params(params).build::<D>()
    }

    fn assemble(params: ParameterSet, kernel: Kernel<D>, field: ActivationField<D>) -> Self {
        debug!(
            dimension = D,
            kernel_entries = kernel.len(),
            kernel_sigma = kernel.sigma(),
            seeded_cells = field.count(),
            "run controller ready"
        );
        Self {
            params,
            kernel,
            field,
        }
    }

    #[must_use]
    pub const fn params(&self) -> &ParameterSet {
        &self.params
    }

    #[must_use]
    pub const fn kernel(&self) -> &Kernel<D> {
        &self.kernel
    }

    #[must_use]
    pub const fn field(&self) -> &ActivationField<D> {
        &self.field
    }

    /// Run to completion, emitting every frame to `sink`.
    pub fn run<S>(self, sink: &mut S) -> LeniaResult<RunResult>
    where
        S: FrameSink<D> + ?Sized,
    {
        self.run_with_observer(sink, |_| {})
    }

    /// Run to completion, calling `observer` after every step.
    ///
    /// Each generation first checks the mass guard, then emits the frame,
    /// then steps. Frames are tagged with their 0-based index. The loop stops
    /// on the frame-time guard, on extinction, or once `num_frames` frames
    /// have been emitted.
    pub fn run_with_observer<S, F>(self, sink: &mut S, mut observer: F) -> LeniaResult<RunResult>
    where
        S: FrameSink<D> + ?Sized,
        F: FnMut(&FrameStats),
    {
        let Self {
            params,
            kernel,
            mut field,
        } = self;
        let step = GenerationStep::new(&kernel, &params);
        let num_frames = params.num_frames;
        let lived_threshold = params.lived_threshold();

        info!(
            dimension = D,
            num_frames,
            seeded_cells = field.count(),
            mode = ?step.mode(),
            "run started"
        );

        let mut emitted: u32 = 0;
        let mut mass = field.total_mass();
        let mut outcome = None;

        for index in 0..num_frames {
            let generation = Generation(index);
            if mass > params.max_cell_mass {
                warn!(
                    generation = index,
                    mass,
                    limit = params.max_cell_mass,
                    "mass guard tripped"
                );
                outcome = Some((Classification::TimedOut, TerminationReason::MassLimit));
                break;
            }

            sink.on_frame(&field.snapshot(generation))
                .map_err(|source| LeniaError::SinkFailure {
                    generation: index,
                    source,
                })?;
            emitted += 1;

            let started = Instant::now();
            field = step.apply(&field);
            let step_seconds = started.elapsed().as_secs_f64();
            mass = field.total_mass();

            let stats = FrameStats {
                generation,
                cell_count: field.count(),
                total_mass: mass,
                step_seconds,
            };
            debug!(
                generation = index,
                cells = stats.cell_count,
                mass,
                step_seconds,
                "generation stepped"
            );
            observer(&stats);

            if step_seconds > params.max_frame_time_seconds {
                warn!(
                    generation = index,
                    step_seconds,
                    limit = params.max_frame_time_seconds,
                    "frame time guard tripped"
                );
                outcome = Some((Classification::TimedOut, TerminationReason::FrameTimeLimit));
                break;
            }

            if field.is_empty() {
                let classification = if f64::from(index) >= lived_threshold {
                    Classification::Lived
                } else {
                    Classification::Died
                };
                outcome = Some((classification, TerminationReason::Extinct));
                break;
            }
        }

        sink.finish().map_err(|source| LeniaError::SinkFailure {
            generation: emitted,
            source,
        })?;

        let (classification, reason) = outcome.unwrap_or((
            Classification::Unstable,
            TerminationReason::FrameBudgetExhausted,
        ));
        let result = RunResult {
            classification,
            actual_frame_count: emitted,
            reason,
            final_cell_count: field.count(),
            final_mass: mass,
        };
        info!(
            classification = %result.classification,
            frames = result.actual_frame_count,
            reason = ?result.reason,
            final_cells = result.final_cell_count,
            "run finished"
        );
        Ok(result)
    }
}
