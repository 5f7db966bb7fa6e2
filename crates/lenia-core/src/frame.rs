use lenia_index::Position;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::field::ActivationField;

/// Index of a generation within a run (the seeded field is generation 0).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Generation(pub u32);

impl Generation {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Alive cells of one generation, sorted by position.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord<const D: usize> {
    pub generation: Generation,
    pub cells: Vec<(Position<D>, f32)>,
}

impl<const D: usize> FrameRecord<D> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.cells.iter().map(|&(_, v)| f64::from(v)).sum()
    }

    /// Rebuild a field from this frame.
    #[must_use]
    pub fn to_field(&self, prune_threshold: f32) -> ActivationField<D> {
        ActivationField::from_pairs(prune_threshold, self.cells.iter().copied())
    }
}

/// Per-generation summary handed to run observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Generation that was stepped from.
    pub generation: Generation,
    /// Alive cells after the step.
    pub cell_count: usize,
    /// Mass after the step.
    pub total_mass: f64,
    pub step_seconds: f64,
}

/// Receives every emitted frame in generation order.
pub trait FrameSink<const D: usize> {
    fn on_frame(&mut self, frame: &FrameRecord<D>) -> Result<(), SinkError>;

    /// Called once after the last frame; buffered sinks flush here.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<const D: usize, S: FrameSink<D> + ?Sized> FrameSink<D> for Box<S> {
    fn on_frame(&mut self, frame: &FrameRecord<D>) -> Result<(), SinkError> {
        (**self).on_frame(frame)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
    }
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<const D: usize> FrameSink<D> for NullSink {
    fn on_frame(&mut self, _frame: &FrameRecord<D>) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every frame in memory; used by tests and short runs.
#[derive(Debug, Clone)]
pub struct MemorySink<const D: usize> {
    frames: Vec<FrameRecord<D>>,
    finished: bool,
}

impl<const D: usize> Default for MemorySink<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> MemorySink<D> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            finished: false,
        }
    }

    #[must_use]
    pub fn frames(&self) -> &[FrameRecord<D>] {
        &self.frames
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn into_frames(self) -> Vec<FrameRecord<D>> {
        self.frames
    }
}

impl<const D: usize> FrameSink<D> for MemorySink<D> {
    fn on_frame(&mut self, frame: &FrameRecord<D>) -> Result<(), SinkError> {
        if self.finished {
            return Err(SinkError::Closed("memory sink already finished".to_string()));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}
