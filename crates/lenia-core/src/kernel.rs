use lenia_index::{Position, Region};

use crate::config::{DEFAULT_MAX_KERNEL_ENTRIES, ParameterSet};
use crate::error::{LeniaError, LeniaResult};

/// One kernel offset and its normalized weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelEntry<const D: usize> {
    pub offset: Position<D>,
    pub weight: f32,
}

/// Dense radial kernel over `[-r, r]^D`, weights summing to 1.
///
/// Entries are stored in row-major offset order, so every offset has a
/// fixed slot (see [`Kernel::weight_at`]).
#[derive(Debug, Clone)]
pub struct Kernel<const D: usize> {
    radius: u32,
    sigma: f64,
    entries: Vec<KernelEntry<D>>,
}

impl<const D: usize> Kernel<D> {
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Absolute kernel sigma (`radius * sigma_multiplier`).
    #[must_use]
    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    #[must_use]
    pub fn entries(&self) -> &[KernelEntry<D>] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights in `f64`; 1 up to rounding.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.entries.iter().map(|e| f64::from(e.weight)).sum()
    }

    /// Weight for `offset`, or `None` if it lies outside `[-r, r]^D`.
    #[must_use]
    pub fn weight_at(&self, offset: Position<D>) -> Option<f32> {
        let r = i64::from(self.radius);
        let side = 2 * r + 1;
        let mut index: i64 = 0;
        for &c in offset.coords() {
            let c = i64::from(c);
            if c < -r || c > r {
                return None;
            }
            index = index * side + (c + r);
        }
        self.entries
            .get(usize::try_from(index).ok()?)
            .map(|e| e.weight)
    }
}

/// Builds a [`Kernel`] for a given radius and sigma multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelBuilder {
    radius: u32,
    sigma_multiplier: f32,
    max_entries: u64,
}

impl KernelBuilder {
    #[must_use]
    pub const fn new(radius: u32, sigma_multiplier: f32) -> Self {
        Self {
            radius,
            sigma_multiplier,
            max_entries: DEFAULT_MAX_KERNEL_ENTRIES,
        }
    }

    #[must_use]
    pub fn from_params(params: &ParameterSet) -> Self {
        Self::new(params.kernel_radius, params.kernel_sigma_multiplier)
            .max_entries(params.max_kernel_entries)
    }

    /// Refuse kernels with more than `max` entries.
    #[must_use]
    pub const fn max_entries(mut self, max: u64) -> Self {
        self.max_entries = max;
        self
    }

    /// Build the kernel for lattice dimension `D`.
    ///
    /// `weight(o) = exp(-(|o| - r/2)^2 / (2 * sigma^2))` before
    /// normalization, with `sigma = r * sigma_multiplier`.
    pub fn build<const D: usize>(&self) -> LeniaResult<Kernel<D>> {
        if self.radius == 0 {
            return Err(LeniaError::InvalidParameter(
                "kernel radius must be > 0".to_string(),
            ));
        }
        let radius = f64::from(self.radius);
        let sigma = radius * f64::from(self.sigma_multiplier);
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(LeniaError::InvalidParameter(format!(
                "kernel sigma must be > 0, got {sigma}"
            )));
        }

        let region = Region::cube(Position::<D>::origin(), self.radius);
        let volume = region.volume().filter(|&v| v <= self.max_entries).ok_or_else(|| {
            LeniaError::ResourceExhaustion(format!(
                "kernel of radius {} in {D} dimensions exceeds {} entries",
                self.radius, self.max_entries
            ))
        })?;
        let capacity = usize::try_from(volume).map_err(|_| {
            LeniaError::ResourceExhaustion(format!("kernel volume {volume} does not fit in memory"))
        })?;

        let ring = radius / 2.0;
        let denom = 2.0 * sigma * sigma;
        let mut raw: Vec<(Position<D>, f64)> = Vec::with_capacity(capacity);
        let mut total = 0.0_f64;
        for offset in region.iter() {
            let d = offset.norm() - ring;
            let w = (-(d * d) / denom).exp();
            total += w;
            raw.push((offset, w));
        }
        if total <= 0.0 || !total.is_finite() {
            return Err(LeniaError::InvalidParameter(format!(
                "kernel sigma {sigma} is too small; every weight underflows"
            )));
        }

        let entries = raw
            .into_iter()
            .map(|(offset, w)| KernelEntry {
                offset,
                weight: (w / total) as f32,
            })
            .collect();
        Ok(Kernel {
            radius: self.radius,
            sigma,
            entries,
        })
    }
}
