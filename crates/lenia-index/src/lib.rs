//! Integer lattice positions and box iteration for N-dimensional sparse fields.

use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Integer lattice coordinate with a fixed number of axes.
///
/// Equality and hashing are component-wise. The derived ordering is
/// lexicographic and only exists so callers can sort positions into a
/// reproducible order; it carries no spatial meaning.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position<const D: usize>(pub [i32; D]);

impl<const D: usize> Position<D> {
    #[must_use]
    pub const fn new(coords: [i32; D]) -> Self {
        Self(coords)
    }

    /// The lattice origin.
    #[must_use]
    pub const fn origin() -> Self {
        Self([0; D])
    }

    /// A position with every component set to `value`.
    #[must_use]
    pub const fn splat(value: i32) -> Self {
        Self([value; D])
    }

    #[must_use]
    pub const fn coords(&self) -> &[i32; D] {
        &self.0
    }

    /// Component-wise sum, or `None` if any axis leaves the `i32` lattice.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let mut out = [0; D];
        for (axis, slot) in out.iter_mut().enumerate() {
            *slot = self.0[axis].checked_add(rhs.0[axis])?;
        }
        Some(Self(out))
    }

    /// Squared Euclidean length, computed in `i64` so large radii cannot overflow.
    #[must_use]
    pub fn norm_squared(&self) -> i64 {
        self.0.iter().map(|&c| i64::from(c) * i64::from(c)).sum()
    }

    /// Euclidean length.
    #[must_use]
    pub fn norm(&self) -> f64 {
        (self.norm_squared() as f64).sqrt()
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self(std::array::from_fn(|axis| self.0[axis].min(other.0[axis])))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self(std::array::from_fn(|axis| self.0[axis].max(other.0[axis])))
    }
}

impl<const D: usize> Default for Position<D> {
    fn default() -> Self {
        Self::origin()
    }
}

impl<const D: usize> fmt::Debug for Position<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position{:?}", self.0)
    }
}

impl<const D: usize> From<[i32; D]> for Position<D> {
    fn from(coords: [i32; D]) -> Self {
        Self(coords)
    }
}

impl<const D: usize> Add for Position<D> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|axis| self.0[axis] + rhs.0[axis]))
    }
}

impl<const D: usize> Sub for Position<D> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|axis| self.0[axis] - rhs.0[axis]))
    }
}

impl<const D: usize> Neg for Position<D> {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.map(|c| -c))
    }
}

/// Axis-aligned box of lattice positions, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region<const D: usize> {
    lo: Position<D>,
    hi: Position<D>,
}

impl<const D: usize> Region<D> {
    /// Box spanning `lo..=hi`; returns `None` when any axis has `lo > hi`.
    #[must_use]
    pub fn new(lo: Position<D>, hi: Position<D>) -> Option<Self> {
        if (0..D).any(|axis| lo.0[axis] > hi.0[axis]) {
            return None;
        }
        Some(Self { lo, hi })
    }

    /// The `(2 * radius + 1)`-sided cube centred on `center`.
    #[must_use]
    pub fn cube(center: Position<D>, radius: u32) -> Self {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        Self {
            lo: Position(center.0.map(|c| c.saturating_sub(r))),
            hi: Position(center.0.map(|c| c.saturating_add(r))),
        }
    }

    /// The cube with `side` cells per axis centred on `center`.
    ///
    /// For odd sides the cube is symmetric; for even sides the extra cell
    /// falls on the negative side, so `side = 4` around 0 covers `-2..=1`.
    /// Returns `None` for `side == 0`.
    #[must_use]
    pub fn centered(center: Position<D>, side: u32) -> Option<Self> {
        if side == 0 {
            return None;
        }
        let side = i32::try_from(side).unwrap_or(i32::MAX);
        let half = side / 2;
        let lo = Position(center.0.map(|c| c.saturating_sub(half)));
        let hi = Position(lo.0.map(|c| c.saturating_add(side - 1)));
        Some(Self { lo, hi })
    }

    /// Smallest box containing every supplied position, or `None` if there are none.
    pub fn bounding<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = Position<D>>,
    {
        let mut iter = positions.into_iter();
        let first = iter.next()?;
        let (lo, hi) = iter.fold((first, first), |(lo, hi), pos| (lo.min(pos), hi.max(pos)));
        Some(Self { lo, hi })
    }

    #[must_use]
    pub const fn lo(&self) -> Position<D> {
        self.lo
    }

    #[must_use]
    pub const fn hi(&self) -> Position<D> {
        self.hi
    }

    /// Grow the box by `margin` cells on every side of every axis.
    #[must_use]
    pub fn expand(&self, margin: u32) -> Self {
        let m = i32::try_from(margin).unwrap_or(i32::MAX);
        Self {
            lo: Position(self.lo.0.map(|c| c.saturating_sub(m))),
            hi: Position(self.hi.0.map(|c| c.saturating_add(m))),
        }
    }

    #[must_use]
    pub fn contains(&self, pos: Position<D>) -> bool {
        (0..D).all(|axis| self.lo.0[axis] <= pos.0[axis] && pos.0[axis] <= self.hi.0[axis])
    }

    /// Cells per axis.
    #[must_use]
    pub fn extent(&self) -> [u64; D] {
        std::array::from_fn(|axis| {
            (i64::from(self.hi.0[axis]) - i64::from(self.lo.0[axis]) + 1) as u64
        })
    }

    /// Total number of cells, or `None` if the count does not fit in a `u64`.
    #[must_use]
    pub fn volume(&self) -> Option<u64> {
        self.extent()
            .iter()
            .try_fold(1u64, |acc, &len| acc.checked_mul(len))
    }

    /// Visit every position in row-major order (last axis varies fastest).
    #[must_use]
    pub fn iter(&self) -> RegionIter<D> {
        RegionIter {
            lo: self.lo.0,
            hi: self.hi.0,
            next: Some(self.lo.0),
        }
    }
}

impl<const D: usize> IntoIterator for &Region<D> {
    type Item = Position<D>;
    type IntoIter = RegionIter<D>;

    fn into_iter(self) -> RegionIter<D> {
        self.iter()
    }
}

/// Odometer over a [`Region`]: the last axis ticks every step and carries
/// into the axis before it when it wraps.
#[derive(Debug, Clone)]
pub struct RegionIter<const D: usize> {
    lo: [i32; D],
    hi: [i32; D],
    next: Option<[i32; D]>,
}

impl<const D: usize> Iterator for RegionIter<D> {
    type Item = Position<D>;

    fn next(&mut self) -> Option<Position<D>> {
        let current = self.next?;
        let mut succ = current;
        self.next = None;
        for axis in (0..D).rev() {
            if succ[axis] < self.hi[axis] {
                succ[axis] += 1;
                self.next = Some(succ);
                break;
            }
            succ[axis] = self.lo[axis];
        }
        Some(Position(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn arithmetic_is_component_wise() {
        let a = Position::new([1, -2, 3]);
        let b = Position::new([4, 5, -6]);
        assert_eq!(a + b, Position::new([5, 3, -3]));
        assert_eq!(a - b, Position::new([-3, -7, 9]));
        assert_eq!(-a, Position::new([-1, 2, -3]));
        assert_eq!(a.min(b), Position::new([1, -2, -6]));
        assert_eq!(a.max(b), Position::new([4, 5, 3]));
    }

    #[test]
    fn checked_add_stops_at_lattice_edge() {
        let edge = Position::new([i32::MAX, 0]);
        assert_eq!(edge.checked_add(Position::new([0, 7])), Some(Position::new([i32::MAX, 7])));
        assert_eq!(edge.checked_add(Position::new([1, 0])), None);
        let low = Position::new([0, i32::MIN + 1]);
        assert_eq!(low.checked_add(Position::new([0, -1])), Some(Position::new([0, i32::MIN])));
        assert_eq!(low.checked_add(Position::new([0, -2])), None);
    }

    #[test]
    fn norm_matches_euclidean_length() {
        let p = Position::new([3, 4]);
        assert_eq!(p.norm_squared(), 25);
        assert!((p.norm() - 5.0).abs() < 1e-12);
        assert_eq!(Position::<4>::origin().norm_squared(), 0);
    }

    #[test]
    fn cube_iteration_visits_every_cell_once() {
        let region = Region::cube(Position::<3>::origin(), 2);
        let cells: Vec<_> = region.iter().collect();
        assert_eq!(cells.len(), 125);
        assert_eq!(region.volume(), Some(125));
        let unique: HashSet<_> = cells.iter().copied().collect();
        assert_eq!(unique.len(), cells.len());
        assert!(cells.iter().all(|&p| region.contains(p)));
    }

    #[test]
    fn iteration_is_row_major() {
        let region = Region::new(Position::new([0, 0]), Position::new([1, 2])).expect("region");
        let cells: Vec<_> = region.iter().map(|p| p.0).collect();
        assert_eq!(
            cells,
            vec![[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]
        );
    }

    #[test]
    fn four_dimensional_cube_volume() {
        let region = Region::cube(Position::<4>::new([5, -5, 0, 1]), 1);
        assert_eq!(region.iter().count(), 81);
        assert_eq!(region.extent(), [3; 4]);
    }

    #[test]
    fn centered_cube_has_requested_side() {
        let odd = Region::centered(Position::<2>::origin(), 5).expect("odd");
        assert_eq!(odd.lo(), Position::new([-2, -2]));
        assert_eq!(odd.hi(), Position::new([2, 2]));
        let even = Region::centered(Position::<2>::new([10, 0]), 4).expect("even");
        assert_eq!(even.lo(), Position::new([8, -2]));
        assert_eq!(even.hi(), Position::new([11, 1]));
        assert_eq!(even.volume(), Some(16));
        assert!(Region::centered(Position::<3>::origin(), 0).is_none());
    }

    #[test]
    fn bounding_box_and_expand() {
        let points = [
            Position::new([1, 7]),
            Position::new([-3, 2]),
            Position::new([4, 0]),
        ];
        let bounds = Region::bounding(points).expect("bounds");
        assert_eq!(bounds.lo(), Position::new([-3, 0]));
        assert_eq!(bounds.hi(), Position::new([4, 7]));
        let grown = bounds.expand(2);
        assert_eq!(grown.lo(), Position::new([-5, -2]));
        assert_eq!(grown.hi(), Position::new([6, 9]));
        assert!(Region::<2>::bounding(std::iter::empty()).is_none());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(Region::new(Position::new([1, 0]), Position::new([0, 0])).is_none());
    }

    #[test]
    fn single_cell_region_yields_one_position() {
        let p = Position::new([7, 8, 9]);
        let region = Region::cube(p, 0);
        assert_eq!(region.iter().collect::<Vec<_>>(), vec![p]);
    }
}
