//! Per-node histogram storage.

use crate::grads::{GradStats, GradientSum};

/// Histogram buffers keyed by node id.
///
/// Buffers are allocated lazily and retained across tree levels so a node
/// that is expanded late reuses no stale data (allocation always zeroes).
/// The parent's buffer stays live while its children are built, which the
/// subtraction trick depends on.
#[derive(Debug)]
pub struct HistogramStore<T: GradientSum> {
    nbins: usize,
    slots: Vec<Option<Box<[GradStats<T>]>>>,
}

impl<T: GradientSum> HistogramStore<T> {
    pub fn new() -> Self {
        Self {
            nbins: 0,
            slots: Vec::new(),
        }
    }

    /// Reset for a new tree with `nbins` global bins.
    pub fn init(&mut self, nbins: usize) {
        self.nbins = nbins;
        self.slots.clear();
    }

    /// Total bins per histogram.
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.nbins
    }

    /// Zeroed histogram for a node, allocating on first use.
    pub fn allocate(&mut self, nid: u32) -> &mut [GradStats<T>] {
        let idx = nid as usize;
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        let slot = self.slots[idx]
            .get_or_insert_with(|| vec![GradStats::default(); self.nbins].into_boxed_slice());
        slot.fill(GradStats::default());
        slot
    }

    /// Histogram of a node, if built.
    #[inline]
    pub fn get(&self, nid: u32) -> Option<&[GradStats<T>]> {
        self.slots.get(nid as usize)?.as_deref()
    }

    /// Mutable histogram of a node, if built.
    #[inline]
    pub fn get_mut(&mut self, nid: u32) -> Option<&mut [GradStats<T>]> {
        self.slots.get_mut(nid as usize)?.as_deref_mut()
    }

    /// Detach a node's buffer so it can be written while other nodes are
    /// read. Pair with [`put`](Self::put).
    pub fn take(&mut self, nid: u32) -> Option<Box<[GradStats<T>]>> {
        self.slots.get_mut(nid as usize)?.take()
    }

    /// Reattach a buffer detached by [`take`](Self::take).
    pub fn put(&mut self, nid: u32, hist: Box<[GradStats<T>]>) {
        let idx = nid as usize;
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        debug_assert_eq!(hist.len(), self.nbins);
        self.slots[idx] = Some(hist);
    }
}

impl<T: GradientSum> Default for HistogramStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
