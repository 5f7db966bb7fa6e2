use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, ValueEnum};
use lenia_core::{ConvolutionMode, ParameterSet};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lenia-run",
    version,
    about = "Run one sparse Lenia simulation and report how it ended"
)]
pub struct Cli {
    /// JSON parameter file; missing keys take defaults and flags override it.
    #[arg(long, short, env = "LENIA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Lattice dimension (2, 3 or 4).
    #[arg(long, short, default_value_t = 3)]
    pub dimension: usize,

    /// Directory receiving `frame_<n>.json` files and `run_summary.json`.
    #[arg(long, short, env = "LENIA_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write frames from a background worker thread.
    #[arg(long)]
    pub async_sink: bool,

    /// Indent frame files.
    #[arg(long)]
    pub pretty_frames: bool,

    /// Print the run report as JSON instead of a summary line.
    #[arg(long)]
    pub print_json: bool,

    #[command(flatten)]
    pub overrides: ParameterOverrides,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Scatter,
    Gather,
}

impl From<ModeArg> for ConvolutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Scatter => ConvolutionMode::Scatter,
            ModeArg::Gather => ConvolutionMode::BoundingBoxGather,
        }
    }
}

/// Per-field overrides applied on top of the parameter file.
#[derive(Args, Debug, Clone, Default)]
pub struct ParameterOverrides {
    #[arg(long, alias = "kernelRadius")]
    pub kernel_radius: Option<u32>,
    #[arg(long, alias = "kernelSigmaMultiplier")]
    pub kernel_sigma_multiplier: Option<f32>,
    #[arg(long, alias = "growthSigmaMultiplier")]
    pub growth_sigma_multiplier: Option<f32>,
    #[arg(long, alias = "growthCenter", allow_negative_numbers = true)]
    pub growth_center: Option<f32>,
    #[arg(long, alias = "growthSteepness")]
    pub growth_steepness: Option<f32>,
    #[arg(long, alias = "deltaT")]
    pub delta_t: Option<f32>,
    #[arg(long, alias = "startingAreaSize")]
    pub starting_area_size: Option<u32>,
    #[arg(long, alias = "startingPoints")]
    pub starting_points: Option<u32>,
    #[arg(long, alias = "randomOffsetRange")]
    pub random_offset_range: Option<u32>,
    #[arg(long, alias = "cellSpawnChance")]
    pub cell_spawn_chance: Option<f32>,
    #[arg(long, alias = "minInitialValue")]
    pub min_initial_value: Option<f32>,
    #[arg(long, alias = "maxInitialValue")]
    pub max_initial_value: Option<f32>,
    #[arg(long, alias = "maxCellMass")]
    pub max_cell_mass: Option<f64>,
    #[arg(long, alias = "maxFrameTimeSeconds")]
    pub max_frame_time_seconds: Option<f64>,
    #[arg(long, alias = "numFrames")]
    pub num_frames: Option<u32>,
    #[arg(long)]
    pub prune_threshold: Option<f32>,
    #[arg(long)]
    pub lived_fraction: Option<f32>,
    #[arg(long, value_enum)]
    pub convolution_mode: Option<ModeArg>,
    #[arg(long, alias = "seed")]
    pub rng_seed: Option<u64>,
    #[arg(long)]
    pub max_kernel_entries: Option<u64>,
}

impl ParameterOverrides {
    pub fn apply(&self, params: &mut ParameterSet) {
        fn set<T: Copy>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        set(&mut params.kernel_radius, self.kernel_radius);
        set(&mut params.kernel_sigma_multiplier, self.kernel_sigma_multiplier);
        set(&mut params.growth_sigma_multiplier, self.growth_sigma_multiplier);
        set(&mut params.growth_center, self.growth_center);
        set(&mut params.growth_steepness, self.growth_steepness);
        set(&mut params.delta_t, self.delta_t);
        set(&mut params.starting_area_size, self.starting_area_size);
        set(&mut params.starting_points, self.starting_points);
        set(&mut params.random_offset_range, self.random_offset_range);
        set(&mut params.cell_spawn_chance, self.cell_spawn_chance);
        set(&mut params.min_initial_value, self.min_initial_value);
        set(&mut params.max_initial_value, self.max_initial_value);
        set(&mut params.max_cell_mass, self.max_cell_mass);
        set(&mut params.max_frame_time_seconds, self.max_frame_time_seconds);
        set(&mut params.num_frames, self.num_frames);
        set(&mut params.prune_threshold, self.prune_threshold);
        set(&mut params.lived_fraction, self.lived_fraction);
        set(&mut params.max_kernel_entries, self.max_kernel_entries);
        if let Some(mode) = self.convolution_mode {
            params.convolution_mode = mode.into();
        }
        if let Some(seed) = self.rng_seed {
            params.rng_seed = Some(seed);
        }
    }
}

impl Cli {
    /// Parameter file (or defaults) with flag overrides applied.
    pub fn parameters(&self) -> Result<ParameterSet> {
        let mut params = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read parameter file {}", path.display()))?;
                ParameterSet::from_json(&text)
                    .with_context(|| format!("failed to parse parameter file {}", path.display()))?
            }
            None => ParameterSet::default(),
        };
        self.overrides.apply(&mut params);
        Ok(params)
    }
}
