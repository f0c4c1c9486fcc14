//! Collective communication seam for multi-worker training.
//!
//! The engine only ever needs an element-wise sum-allreduce over `f64`
//! buffers, so that is the whole trait. Single-process training uses
//! [`SingleWorker`], which reduces over a world of one and therefore does
//! nothing.

use crate::error::CollectiveError;

/// Sum-allreduce across all workers participating in training.
pub trait Collective: Send + Sync {
    /// Number of workers in the training group.
    fn world_size(&self) -> usize;

    /// Element-wise sum across workers; every worker sees the same result.
    fn allreduce_sum(&self, buffer: &mut [f64]) -> Result<(), CollectiveError>;

    /// Whether reductions actually cross worker boundaries.
    #[inline]
    fn is_distributed(&self) -> bool {
        self.world_size() > 1
    }
}

/// No-op collective for single-process training.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWorker;

impl Collective for SingleWorker {
    #[inline]
    fn world_size(&self) -> usize {
        1
    }

    #[inline]
    fn allreduce_sum(&self, _buffer: &mut [f64]) -> Result<(), CollectiveError> {
        Ok(())
    }
}
