//! Sparse N-dimensional Lenia engine: kernel construction, the activation
//! field, the generation step and the run controller that classifies a run.

pub mod config;
pub mod error;
pub mod field;
pub mod frame;
pub mod growth;
pub mod kernel;
pub mod run;
pub mod step;

pub use config::{
    ConvolutionMode, DEFAULT_MAX_KERNEL_ENTRIES, ParameterSet, SUPPORTED_DIMENSIONS,
    validate_dimension,
};
pub use error::{LeniaError, LeniaResult, SinkError};
pub use field::ActivationField;
pub use frame::{FrameRecord, FrameSink, FrameStats, Generation, MemorySink, NullSink};
pub use growth::{GrowthFunction, clamp01, integrate};
pub use kernel::{Kernel, KernelBuilder, KernelEntry};
pub use lenia_index::{Position, Region};
pub use run::{Classification, RunController, RunResult, TerminationReason};
pub use step::{GenerationStep, next_generation};

/// Run a fresh simulation in dimension `D` against `sink`.
pub fn simulate<const D: usize, S>(params: ParameterSet, sink: &mut S) -> LeniaResult<RunResult>
where
    S: FrameSink<D> + ?Sized,
{
    RunController::<D>::new(params)?.run(sink)
}
