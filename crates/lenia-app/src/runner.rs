use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use lenia_core::{
    FrameSink, FrameStats, NullSink, ParameterSet, RunController, RunResult, validate_dimension,
};
use lenia_storage::{FramePipeline, JsonFrameWriter, RunSummary, write_run_summary};
use serde::Serialize;
use tracing::info;

use crate::cli::Cli;

/// Generations between progress lines.
const PROGRESS_EVERY: u32 = 10;

/// What `lenia-run` reports once a simulation has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub dimension: usize,
    #[serde(flatten)]
    pub result: RunResult,
    pub peak_cells: usize,
    pub peak_mass: f64,
    pub output_dir: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Peaks {
    cells: usize,
    mass: f64,
}

impl Peaks {
    fn observe(&mut self, stats: &FrameStats) {
        self.cells = self.cells.max(stats.cell_count);
        self.mass = self.mass.max(stats.total_mass);
    }
}

/// Build parameters from `cli`, run one simulation and archive its summary.
pub fn execute(cli: &Cli) -> Result<RunReport> {
    let params = cli.parameters()?;
    validate_dimension(cli.dimension)?;
    params.validate()?;

    let (result, peaks) = match cli.dimension {
        2 => run_in::<2>(cli, &params)?,
        3 => run_in::<3>(cli, &params)?,
        4 => run_in::<4>(cli, &params)?,
        other => bail!("unsupported dimension {other}"),
    };

    let summary_path = match &cli.output_dir {
        Some(dir) => {
            let summary = RunSummary {
                dimension: cli.dimension,
                result: result.clone(),
                parameters: params,
            };
            let path = write_run_summary(dir, &summary)
                .with_context(|| format!("failed to write run summary into {}", dir.display()))?;
            Some(path)
        }
        None => None,
    };

    Ok(RunReport {
        dimension: cli.dimension,
        result,
        peak_cells: peaks.cells,
        peak_mass: peaks.mass,
        output_dir: cli.output_dir.clone(),
        summary_path,
    })
}

fn frame_sink<const D: usize>(cli: &Cli) -> Result<Box<dyn FrameSink<D>>> {
    let Some(dir) = &cli.output_dir else {
        return Ok(Box::new(NullSink));
    };
    let writer = JsonFrameWriter::create(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?
        .pretty(cli.pretty_frames);
    if cli.async_sink {
        let pipeline =
            FramePipeline::<D>::spawn(writer).context("failed to start frame pipeline")?;
        Ok(Box::new(pipeline))
    } else {
        Ok(Box::new(writer))
    }
}

fn run_in<const D: usize>(cli: &Cli, params: &ParameterSet) -> Result<(RunResult, Peaks)> {
    let controller = RunController::<D>::new(params.clone())?;
    let mut sink = frame_sink::<D>(cli)?;
    let mut peaks = Peaks {
        cells: controller.field().count(),
        mass: controller.field().total_mass(),
    };
    let result = controller.run_with_observer(&mut *sink, |stats| {
        peaks.observe(stats);
        if stats.generation.0.is_multiple_of(PROGRESS_EVERY) {
            info!(
                generation = stats.generation.0,
                cells = stats.cell_count,
                mass = stats.total_mass,
                "progress"
            );
        }
    })?;
    Ok((result, peaks))
}
