use std::collections::HashMap;

use lenia_index::Position;
use rayon::prelude::*;

use crate::config::{ConvolutionMode, ParameterSet};
use crate::field::ActivationField;
use crate::growth::{GrowthFunction, integrate};
use crate::kernel::Kernel;

/// Alive cells per scatter task. Fixed so the reduction order, and therefore
/// the floating-point result, does not depend on the thread count.
const SCATTER_CHUNK: usize = 256;

/// Computes generation `n + 1` from generation `n`.
///
/// The step is pure: it reads the input field and the frozen kernel and
/// returns a new field.
#[derive(Debug, Clone, Copy)]
pub struct GenerationStep<'a, const D: usize> {
    kernel: &'a Kernel<D>,
    growth: GrowthFunction,
    delta_t: f32,
    prune_threshold: f32,
    mode: ConvolutionMode,
}

impl<'a, const D: usize> GenerationStep<'a, D> {
    #[must_use]
    pub fn new(kernel: &'a Kernel<D>, params: &ParameterSet) -> Self {
        Self {
            kernel,
            growth: params.growth_function(),
            delta_t: params.delta_t,
            prune_threshold: params.prune_threshold,
            mode: params.convolution_mode,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ConvolutionMode {
        self.mode
    }

    /// Produce the next generation.
    #[must_use]
    pub fn apply(&self, field: &ActivationField<D>) -> ActivationField<D> {
        if field.is_empty() {
            return ActivationField::new(self.prune_threshold);
        }
        match self.mode {
            ConvolutionMode::Scatter => self.scatter(field),
            ConvolutionMode::BoundingBoxGather => self.gather(field),
        }
    }

    /// Kernel-weighted sum of the neighbourhood of `pos`. Offsets that leave
    /// the `i32` lattice contribute nothing.
    #[must_use]
    pub fn convolution_at(&self, field: &ActivationField<D>, pos: Position<D>) -> f32 {
        self.kernel
            .entries()
            .iter()
            .filter_map(|entry| Some(field.get(pos.checked_add(entry.offset)?) * entry.weight))
            .sum()
    }

    #[inline]
    fn next_value(&self, current: f32, convolution: f32) -> f32 {
        integrate(current, self.growth.eval(convolution), self.delta_t)
    }

    fn scatter(&self, field: &ActivationField<D>) -> ActivationField<D> {
        let alive = field.to_pairs();
        let entries = self.kernel.entries();

        let partials: Vec<HashMap<Position<D>, f32>> = alive
            .par_chunks(SCATTER_CHUNK)
            .map(|chunk| {
                let mut local: HashMap<Position<D>, f32> = HashMap::new();
                for &(pos, value) in chunk {
                    for entry in entries {
                        let Some(target) = pos.checked_add(entry.offset) else {
                            continue;
                        };
                        *local.entry(target).or_insert(0.0) += value * entry.weight;
                    }
                }
                local
            })
            .collect();

        let mut partials = partials.into_iter();
        let mut convolution = partials.next().unwrap_or_default();
        for partial in partials {
            for (pos, contribution) in partial {
                *convolution.entry(pos).or_insert(0.0) += contribution;
            }
        }

        let next: Vec<(Position<D>, f32)> = convolution
            .into_par_iter()
            .filter_map(|(pos, conv)| {
                let value = self.next_value(field.get(pos), conv);
                (value > self.prune_threshold).then_some((pos, value))
            })
            .collect();
        ActivationField::from_pairs(self.prune_threshold, next)
    }

    fn gather(&self, field: &ActivationField<D>) -> ActivationField<D> {
        let Some(bounds) = field.bounding_box() else {
            return ActivationField::new(self.prune_threshold);
        };
        let region = bounds.expand(self.kernel.radius());
        let next: Vec<(Position<D>, f32)> = region
            .iter()
            .par_bridge()
            .filter_map(|pos| {
                let conv = self.convolution_at(field, pos);
                let value = self.next_value(field.get(pos), conv);
                (value > self.prune_threshold).then_some((pos, value))
            })
            .collect();
        ActivationField::from_pairs(self.prune_threshold, next)
    }
}

/// Convenience wrapper: one generation step without keeping a [`GenerationStep`].
#[must_use]
pub fn next_generation<const D: usize>(
    field: &ActivationField<D>,
    kernel: &Kernel<D>,
    params: &ParameterSet,
) -> ActivationField<D> {
    GenerationStep::new(kernel, params).apply(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelBuilder;
    use lenia_index::Region;

    fn params() -> ParameterSet {
        ParameterSet {
            kernel_radius: 2,
            kernel_sigma_multiplier: 0.5,
            growth_sigma_multiplier: 0.05,
            growth_center: 0.15,
            delta_t: 0.1,
            ..ParameterSet::default()
        }
    }

    fn block<const D: usize>(side: i32) -> impl Iterator<Item = Position<D>> {
        Region::new(Position::origin(), Position::splat(side - 1))
            .expect("block")
            .iter()
    }

    fn kernel<const D: usize>(params: &ParameterSet) -> Kernel<D> {
        KernelBuilder::from_params(params).build::<D>().expect("kernel")
    }

    #[test]
    fn empty_field_stays_empty() {
        let params = params();
        let kernel = kernel::<3>(&params);
        let step = GenerationStep::new(&kernel, &params);
        assert_eq!(step.mode(), ConvolutionMode::Scatter);
        assert!(step.apply(&ActivationField::new(0.01)).is_empty());
        let gather = ParameterSet {
            convolution_mode: ConvolutionMode::BoundingBoxGather,
            ..params
        };
        assert!(next_generation(&ActivationField::new(0.01), &kernel, &gather).is_empty());
    }

    #[test]
    fn isolated_cell_matches_hand_computation() {
        let params = params();
        let kernel = kernel::<2>(&params);
        let origin = Position::origin();
        let field = ActivationField::from_pairs(params.prune_threshold, [(origin, 0.8)]);
        let next = next_generation(&field, &kernel, &params);

        let growth = params.growth_function();
        for entry in kernel.entries() {
            let target = origin + entry.offset;
            let conv = 0.8 * entry.weight;
            let current = if target == origin { 0.8 } else { 0.0 };
            let expected = integrate(current, growth.eval(conv), params.delta_t);
            let actual = next.get(target);
            if expected > params.prune_threshold {
                assert!((actual - expected).abs() < 1e-6, "{target:?}: {actual} vs {expected}");
            } else {
                assert!(!next.contains(target));
            }
        }
        assert!(next.iter().all(|(pos, _)| kernel.weight_at(pos).is_some()));
    }

    #[test]
    fn scatter_agrees_with_gather_on_reachable_cells() {
        let params = params();
        let kernel = kernel::<2>(&params);
        let field = ActivationField::from_pairs(
            params.prune_threshold,
            [
                (Position::new([0, 0]), 0.9),
                (Position::new([1, 0]), 0.6),
                (Position::new([0, 3]), 0.4),
            ],
        );
        let step = GenerationStep::new(&kernel, &params);
        let scattered = step.apply(&field);
        for (pos, value) in scattered.iter() {
            let conv = step.convolution_at(&field, pos);
            let expected = integrate(field.get(pos), params.growth_function().eval(conv), 0.1);
            assert!((value - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn scatter_is_deterministic_across_runs() {
        let params = params();
        let kernel = kernel::<3>(&params);
        let field = ActivationField::from_pairs(
            params.prune_threshold,
            block::<3>(4)
                .enumerate()
                .map(|(i, pos)| (pos, 0.2 + (i % 7) as f32 * 0.1)),
        );
        let a = next_generation(&field, &kernel, &params);
        let b = next_generation(&field, &kernel, &params);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn step_keeps_values_in_unit_range_above_threshold() {
        let params = ParameterSet {
            delta_t: 1.0,
            growth_center: 0.05,
            ..params()
        };
        let kernel = kernel::<2>(&params);
        let field = ActivationField::from_pairs(
            params.prune_threshold,
            block::<2>(6)
                .enumerate()
                .map(|(i, pos)| (pos, if i % 2 == 0 { 1.0 } else { 0.3 })),
        );
        let next = next_generation(&field, &kernel, &params);
        assert!(next.iter().all(|(_, v)| v > params.prune_threshold && v <= 1.0));
    }

    #[test]
    fn gather_can_grow_into_empty_space() {
        let params = ParameterSet {
            convolution_mode: ConvolutionMode::BoundingBoxGather,
            growth_center: 0.0,
            growth_sigma_multiplier: 0.5,
            delta_t: 0.5,
            ..params()
        };
        let kernel = kernel::<2>(&params);
        let field =
            ActivationField::from_pairs(params.prune_threshold, [(Position::origin(), 0.9)]);
        let next = next_generation(&field, &kernel, &params);
        let corner = Position::new([2, 2]);
        assert!(next.contains(corner));
        assert_eq!(next.bounding_box().map(|b| b.extent()), Some([5, 5]));
    }

    #[test]
    fn cells_at_the_lattice_edge_do_not_wrap() {
        let corner = Position::new([i32::MAX, i32::MIN]);
        for mode in [ConvolutionMode::Scatter, ConvolutionMode::BoundingBoxGather] {
            let params = ParameterSet {
                convolution_mode: mode,
                delta_t: 0.01,
                ..params()
            };
            let kernel = kernel::<2>(&params);
            let step = GenerationStep::new(&kernel, &params);
            assert_eq!(step.mode(), mode);
            let field = ActivationField::from_pairs(params.prune_threshold, [(corner, 0.9)]);
            let next = step.apply(&field);
            assert!(next.contains(corner), "{mode:?}");
            // Only the quadrant that stays inside the lattice can receive mass.
            for (pos, _) in next.iter() {
                assert!(pos.0[0] > i32::MAX - 3 && pos.0[1] < i32::MIN + 3, "{mode:?}: {pos:?}");
            }
            let conv = step.convolution_at(&field, corner);
            let centre = kernel.weight_at(Position::origin()).expect("centre weight");
            assert!((conv - 0.9 * centre).abs() < 1e-6);
        }
    }
}
