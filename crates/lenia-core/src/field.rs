use std::collections::HashMap;

use lenia_index::{Position, Region};
use rand::Rng;

use crate::config::ParameterSet;
use crate::frame::{FrameRecord, Generation};

/// Sparse activation field: only cells above the prune threshold are stored.
///
/// Every stored value lies in `(prune_threshold, 1]`; absent positions read
/// as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationField<const D: usize> {
    cells: HashMap<Position<D>, f32>,
    prune_threshold: f32,
}

impl<const D: usize> ActivationField<D> {
    #[must_use]
    pub fn new(prune_threshold: f32) -> Self {
        Self::with_capacity(prune_threshold, 0)
    }

    #[must_use]
    pub fn with_capacity(prune_threshold: f32, capacity: usize) -> Self {
        Self {
            cells: HashMap::with_capacity(capacity),
            prune_threshold,
        }
    }

    /// Build a field from `(position, value)` pairs with [`Self::set`]
    /// semantics; later pairs overwrite earlier ones.
    pub fn from_pairs<I>(prune_threshold: f32, pairs: I) -> Self
    where
        I: IntoIterator<Item = (Position<D>, f32)>,
    {
        let pairs = pairs.into_iter();
        let mut field = Self::with_capacity(prune_threshold, pairs.size_hint().0);
        for (pos, value) in pairs {
            field.set(pos, value);
        }
        field
    }

    /// Seed a field from `params` using `rng`.
    ///
    /// Each of `starting_points` clusters is centred on an offset drawn per
    /// axis from `[-range/2, range/2]` and covers a cube of
    /// `starting_area_size` cells per axis. Every cell of a cluster is
    /// populated with probability `cell_spawn_chance` and a value drawn from
    /// `[min_initial_value, max_initial_value]`. Overlapping clusters
    /// overwrite each other.
    pub fn seed<R: Rng + ?Sized>(params: &ParameterSet, rng: &mut R) -> Self {
        let mut field = Self::new(params.prune_threshold);
        let half_range = i32::try_from(params.random_offset_range / 2).unwrap_or(i32::MAX);
        for _ in 0..params.starting_points {
            let center = Position(std::array::from_fn(|_| {
                rng.random_range(-half_range..=half_range)
            }));
            let Some(area) = Region::centered(center, params.starting_area_size) else {
                continue;
            };
            for pos in area.iter() {
                if rng.random::<f32>() < params.cell_spawn_chance {
                    let value =
                        rng.random_range(params.min_initial_value..=params.max_initial_value);
                    field.set(pos, value);
                }
            }
        }
        field
    }

    #[must_use]
    pub const fn prune_threshold(&self) -> f32 {
        self.prune_threshold
    }

    /// Value at `pos`, zero if not stored.
    #[inline]
    #[must_use]
    pub fn get(&self, pos: Position<D>) -> f32 {
        self.cells.get(&pos).copied().unwrap_or(0.0)
    }

    /// Store `value` (capped at 1) if it exceeds the prune threshold,
    /// otherwise remove the position.
    pub fn set(&mut self, pos: Position<D>, value: f32) {
        if value > self.prune_threshold {
            self.cells.insert(pos, value.min(1.0));
        } else {
            self.cells.remove(&pos);
        }
    }

    pub fn remove(&mut self, pos: Position<D>) -> Option<f32> {
        self.cells.remove(&pos)
    }

    #[must_use]
    pub fn contains(&self, pos: Position<D>) -> bool {
        self.cells.contains_key(&pos)
    }

    /// Number of alive cells.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of stored values.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.cells.values().map(|&v| f64::from(v)).sum()
    }

    /// Alive cells in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (Position<D>, f32)> + '_ {
        self.cells.iter().map(|(&pos, &value)| (pos, value))
    }

    /// Smallest box holding every alive cell.
    #[must_use]
    pub fn bounding_box(&self) -> Option<Region<D>> {
        Region::bounding(self.cells.keys().copied())
    }

    /// Alive cells sorted by position.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(Position<D>, f32)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable_by_key(|&(pos, _)| pos);
        pairs
    }

    #[must_use]
    pub fn snapshot(&self, generation: Generation) -> FrameRecord<D> {
        FrameRecord {
            generation,
            cells: self.to_pairs(),
        }
    }
}
