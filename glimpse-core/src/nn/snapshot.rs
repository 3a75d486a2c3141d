//! Per-step output snapshots for backpropagation through time.

use crate::error::GlimpseError;
use crate::types::Element;
use ndarray::Array2;

/// Outputs of both sub-layers of a recurrent-attention step, saved during
/// a training forward pass and restored during the matching backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSnapshot<T> {
    pub recurrent: Array2<T>,
    pub action: Array2<T>,
}

/// LIFO stack of [`StepSnapshot`]s.
///
/// Forward pushes one entry per unrolled step; backward pops them in reverse.
/// The stack must be empty again once the backward pass has replayed every
/// step.
#[derive(Debug, Clone)]
pub struct SnapshotStack<T> {
    entries: Vec<StepSnapshot<T>>,
}

impl<T> Default for SnapshotStack<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Element> SnapshotStack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: StepSnapshot<T>) {
        self.entries.push(snapshot);
    }

    /// Removes the most recently pushed snapshot.
    pub fn pop(&mut self) -> Result<StepSnapshot<T>, GlimpseError> {
        self.entries.pop().ok_or(GlimpseError::SnapshotUnderflow {
            requested: 1,
            available: 0,
        })
    }

    /// The snapshot that the next `pop` would return.
    pub fn peek(&self) -> Option<&StepSnapshot<T>> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fails unless exactly `expected` snapshots are pending.
    pub fn expect_len(&self, expected: usize) -> Result<(), GlimpseError> {
        if self.entries.len() < expected {
            return Err(GlimpseError::SnapshotUnderflow {
                requested: expected,
                available: self.entries.len(),
            });
        }
        if self.entries.len() != expected {
            return Err(GlimpseError::UnbalancedSnapshots {
                expected,
                actual: self.entries.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
