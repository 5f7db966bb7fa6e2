use std::ops::RangeInclusive;

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::error::{LeniaError, LeniaResult};
use crate::growth::GrowthFunction;

/// Lattice dimensions the engine is exercised with.
pub const SUPPORTED_DIMENSIONS: RangeInclusive<usize> = 2..=4;

/// Upper bound on `(2r + 1)^D` unless overridden.
pub const DEFAULT_MAX_KERNEL_ENTRIES: u64 = 20_000_000;

/// How the convolution for the next generation is evaluated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConvolutionMode {
    /// Scatter each alive cell through the kernel; only positions reachable
    /// from an alive cell are evaluated.
    #[default]
    Scatter,
    /// Evaluate every position of the alive bounding box grown by the kernel
    /// radius. Because `growth(0) > 0`, empty parts of the box can gain mass.
    BoundingBoxGather,
}

/// Immutable configuration for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParameterSet {
    /// Kernel radius in lattice cells; the kernel spans `[-r, r]^D`.
    pub kernel_radius: u32,
    /// Kernel sigma as a fraction of the radius.
    pub kernel_sigma_multiplier: f32,
    /// Growth sigma as a fraction of the radius.
    pub growth_sigma_multiplier: f32,
    /// Convolution value at which growth peaks.
    pub growth_center: f32,
    /// Sharpness of the growth bell.
    pub growth_steepness: f32,
    /// Integration step applied to `2 * growth - 1`.
    pub delta_t: f32,
    /// Side length (cells per axis) of each seeded cluster.
    pub starting_area_size: u32,
    /// Number of seeded clusters.
    pub starting_points: u32,
    /// Cluster centres are drawn per axis from `[-range/2, range/2]`.
    pub random_offset_range: u32,
    /// Probability that a cell inside a cluster is seeded.
    pub cell_spawn_chance: f32,
    pub min_initial_value: f32,
    pub max_initial_value: f32,
    /// Total field mass above which the run is stopped as `timed_out`.
    pub max_cell_mass: f64,
    /// Wall-clock budget for a single generation step.
    pub max_frame_time_seconds: f64,
    /// Maximum number of generations to emit.
    pub num_frames: u32,
    /// Values at or below this are dropped from the sparse field.
    pub prune_threshold: f32,
    /// Extinction at or after this fraction of `num_frames` counts as `lived`.
    pub lived_fraction: f32,
    pub convolution_mode: ConvolutionMode,
    /// Optional RNG seed for reproducible seeding.
    pub rng_seed: Option<u64>,
    /// Largest kernel (in entries) the builder will allocate.
    pub max_kernel_entries: u64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            kernel_radius: 5,
            kernel_sigma_multiplier: 0.125,
            growth_sigma_multiplier: 0.0035,
            growth_center: 0.15,
            growth_steepness: 1.0,
            delta_t: 0.1,
            starting_area_size: 5,
            starting_points: 1,
            random_offset_range: 0,
            cell_spawn_chance: 0.7,
            min_initial_value: 0.5,
            max_initial_value: 1.0,
            max_cell_mass: 10_000_000.0,
            max_frame_time_seconds: 1_500.0,
            num_frames: 30,
            prune_threshold: 0.01,
            lived_fraction: 0.6,
            convolution_mode: ConvolutionMode::Scatter,
            rng_seed: None,
            max_kernel_entries: DEFAULT_MAX_KERNEL_ENTRIES,
        }
    }
}

fn invalid(message: String) -> LeniaError {
    LeniaError::InvalidParameter(message)
}

impl ParameterSet {
    /// Validate every field, reporting the first offending one.
    pub fn validate(&self) -> LeniaResult<()> {
        if self.kernel_radius == 0 {
            return Err(invalid("kernel_radius must be > 0".to_string()));
        }
        let kernel_sigma = self.kernel_sigma();
        if !kernel_sigma.is_finite() || kernel_sigma <= 0.0 {
            return Err(invalid(format!(
                "kernel sigma (kernel_radius * kernel_sigma_multiplier) must be > 0, got {kernel_sigma}"
            )));
        }
        let growth_sigma = self.growth_sigma();
        if !growth_sigma.is_finite() || growth_sigma <= 0.0 {
            return Err(invalid(format!(
                "growth sigma (kernel_radius * growth_sigma_multiplier) must be > 0, got {growth_sigma}"
            )));
        }
        if !self.growth_center.is_finite() {
            return Err(invalid(format!(
                "growth_center must be finite, got {}",
                self.growth_center
            )));
        }
        if !self.growth_steepness.is_finite() || self.growth_steepness <= 0.0 {
            return Err(invalid(format!(
                "growth_steepness must be > 0, got {}",
                self.growth_steepness
            )));
        }
        if !self.delta_t.is_finite() || self.delta_t <= 0.0 {
            return Err(invalid(format!("delta_t must be > 0, got {}", self.delta_t)));
        }
        if self.starting_points == 0 {
            return Err(invalid("starting_points must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.cell_spawn_chance) {
            return Err(invalid(format!(
                "cell_spawn_chance must be in [0, 1], got {}",
                self.cell_spawn_chance
            )));
        }
        if !(0.0..=1.0).contains(&self.min_initial_value)
            || !(0.0..=1.0).contains(&self.max_initial_value)
        {
            return Err(invalid(format!(
                "initial values must be in [0, 1], got [{}, {}]",
                self.min_initial_value, self.max_initial_value
            )));
        }
        if self.min_initial_value > self.max_initial_value {
            return Err(invalid(format!(
                "min_initial_value ({}) cannot exceed max_initial_value ({})",
                self.min_initial_value, self.max_initial_value
            )));
        }
        if self.max_cell_mass.is_nan() || self.max_cell_mass < 0.0 {
            return Err(invalid(format!(
                "max_cell_mass must be >= 0, got {}",
                self.max_cell_mass
            )));
        }
        if self.max_frame_time_seconds.is_nan() || self.max_frame_time_seconds <= 0.0 {
            return Err(invalid(format!(
                "max_frame_time_seconds must be > 0, got {}",
                self.max_frame_time_seconds
            )));
        }
        if !(0.0..1.0).contains(&self.prune_threshold) {
            return Err(invalid(format!(
                "prune_threshold must be in [0, 1), got {}",
                self.prune_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.lived_fraction) {
            return Err(invalid(format!(
                "lived_fraction must be in [0, 1], got {}",
                self.lived_fraction
            )));
        }
        if self.max_kernel_entries == 0 {
            return Err(invalid("max_kernel_entries must be > 0".to_string()));
        }
        Ok(())
    }

    /// `kernel_radius * kernel_sigma_multiplier`.
    #[must_use]
    pub fn kernel_sigma(&self) -> f32 {
        self.kernel_radius as f32 * self.kernel_sigma_multiplier
    }

    /// `kernel_radius * growth_sigma_multiplier`.
    #[must_use]
    pub fn growth_sigma(&self) -> f32 {
        self.kernel_radius as f32 * self.growth_sigma_multiplier
    }

    #[must_use]
    pub fn growth_function(&self) -> GrowthFunction {
        GrowthFunction::new(self.growth_center, self.growth_sigma(), self.growth_steepness)
    }

    /// Generation index from which extinction is classified as `lived`.
    #[must_use]
    pub fn lived_threshold(&self) -> f64 {
        f64::from(self.lived_fraction) * f64::from(self.num_frames)
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Load from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> LeniaResult<Self> {
        serde_json::from_str(json).map_err(|e| invalid(format!("JSON parse error: {e}")))
    }
}

/// Reject lattice dimensions outside [`SUPPORTED_DIMENSIONS`].
pub fn validate_dimension(dimension: usize) -> LeniaResult<()> {
    if SUPPORTED_DIMENSIONS.contains(&dimension) {
        Ok(())
    } else {
        Err(invalid(format!(
            "dimension must be in {}..={}, got {dimension}",
            SUPPORTED_DIMENSIONS.start(),
            SUPPORTED_DIMENSIONS.end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_invalid(params: ParameterSet, needle: &str) {
        match params.validate() {
            Err(LeniaError::InvalidParameter(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
            }
            other => panic!("expected InvalidParameter mentioning {needle}, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        ParameterSet::default().validate().expect("defaults validate");
    }

    #[test]
    fn rejects_zero_radius() {
        expect_invalid(
            ParameterSet {
                kernel_radius: 0,
                ..ParameterSet::default()
            },
            "kernel_radius",
        );
    }

    #[test]
    fn rejects_zero_sigmas() {
        expect_invalid(
            ParameterSet {
                kernel_sigma_multiplier: 0.0,
                ..ParameterSet::default()
            },
            "kernel sigma",
        );
        expect_invalid(
            ParameterSet {
                growth_sigma_multiplier: 0.0,
                ..ParameterSet::default()
            },
            "growth sigma",
        );
    }

    #[test]
    fn rejects_inverted_initial_range() {
        expect_invalid(
            ParameterSet {
                min_initial_value: 0.9,
                max_initial_value: 0.2,
                ..ParameterSet::default()
            },
            "min_initial_value",
        );
    }

    #[test]
    fn rejects_bad_probabilities() {
        expect_invalid(
            ParameterSet {
                cell_spawn_chance: 1.5,
                ..ParameterSet::default()
            },
            "cell_spawn_chance",
        );
        expect_invalid(
            ParameterSet {
                cell_spawn_chance: f32::NAN,
                ..ParameterSet::default()
            },
            "cell_spawn_chance",
        );
        expect_invalid(
            ParameterSet {
                lived_fraction: -0.1,
                ..ParameterSet::default()
            },
            "lived_fraction",
        );
    }

    #[test]
    fn rejects_non_positive_delta_t_and_zero_points() {
        expect_invalid(
            ParameterSet {
                delta_t: 0.0,
                ..ParameterSet::default()
            },
            "delta_t",
        );
        expect_invalid(
            ParameterSet {
                starting_points: 0,
                ..ParameterSet::default()
            },
            "starting_points",
        );
    }

    #[test]
    fn sigmas_scale_with_radius() {
        let params = ParameterSet {
            kernel_radius: 8,
            kernel_sigma_multiplier: 0.25,
            growth_sigma_multiplier: 0.5,
            ..ParameterSet::default()
        };
        assert!((params.kernel_sigma() - 2.0).abs() < f32::EPSILON);
        assert!((params.growth_sigma() - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let params = ParameterSet::from_json(
            r#"{"kernel_radius": 3, "convolution_mode": "bounding_box_gather", "rng_seed": 7}"#,
        )
        .expect("parse");
        assert_eq!(params.kernel_radius, 3);
        assert_eq!(params.convolution_mode, ConvolutionMode::BoundingBoxGather);
        assert_eq!(params.rng_seed, Some(7));
        assert_eq!(params.num_frames, ParameterSet::default().num_frames);
    }

    #[test]
    fn malformed_json_is_invalid_parameter() {
        assert!(matches!(
            ParameterSet::from_json("{not json"),
            Err(LeniaError::InvalidParameter(_))
        ));
    }

    #[test]
    fn dimension_bounds() {
        assert!(validate_dimension(2).is_ok());
        assert!(validate_dimension(4).is_ok());
        assert!(validate_dimension(1).is_err());
        assert!(validate_dimension(5).is_err());
    }

    #[test]
    fn lived_threshold_is_fraction_of_frames() {
        let params = ParameterSet {
            num_frames: 40,
            lived_fraction: 0.6,
            ..ParameterSet::default()
        };
        assert!((params.lived_threshold() - 24.0).abs() < 1e-4);
    }
}
