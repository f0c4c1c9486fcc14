//! Histogram synchronization: allreduce plus the subtraction trick.
//!
//! After the explicit half of each sibling pair is built from rows, its
//! histogram is (in distributed training) sum-allreduced across workers,
//! and the other half is derived as `parent - explicit` without touching
//! any row. Subtraction happens after the allreduce so the derived half is
//! already globally consistent.

use std::sync::Arc;

use crate::collective::Collective;
use crate::error::CollectiveError;
use crate::grads::{GradStats, GradientSum};
use crate::histogram::HistogramStore;
use crate::tree::{ExpandEntry, GrowingTree};

pub struct HistogramSynchronizer {
    collective: Arc<dyn Collective>,
    /// Flattened f64 staging for allreduce, reused across calls.
    buffer: Vec<f64>,
}

impl HistogramSynchronizer {
    pub fn new(collective: Arc<dyn Collective>) -> Self {
        Self {
            collective,
            buffer: Vec::new(),
        }
    }

    /// Synchronize one batch of freshly built histograms.
    ///
    /// `explicit` nodes were built from rows; `subtraction` nodes are their
    /// siblings and are filled here as `parent - sibling`. Every node in
    /// either list must already have an allocated histogram, as must each
    /// subtraction node's parent.
    pub fn sync<T: GradientSum>(
        &mut self,
        store: &mut HistogramStore<T>,
        tree: &GrowingTree,
        explicit: &[ExpandEntry],
        subtraction: &[ExpandEntry],
    ) -> Result<(), CollectiveError> {
        if self.collective.is_distributed() && !explicit.is_empty() {
            self.allreduce_histograms(store, explicit)?;
        }

        for entry in subtraction {
            let parent = tree
                .parent(entry.nid)
                .expect("subtraction node must have a parent");
            let sibling = tree
                .sibling(entry.nid)
                .expect("subtraction node must have a sibling");

            let mut dest = store
                .take(entry.nid)
                .expect("subtraction node histogram not allocated");
            {
                let parent_hist = store.get(parent).expect("parent histogram missing");
                let sibling_hist = store.get(sibling).expect("sibling histogram missing");
                for ((d, p), s) in dest.iter_mut().zip(parent_hist).zip(sibling_hist) {
                    *d = *p - *s;
                }
            }
            store.put(entry.nid, dest);
        }
        Ok(())
    }

    /// Sum node statistics across workers.
    pub fn reduce_stats<T: GradientSum>(
        &mut self,
        stats: &mut GradStats<T>,
    ) -> Result<(), CollectiveError> {
        if !self.collective.is_distributed() {
            return Ok(());
        }
        self.buffer.clear();
        self.buffer.push(stats.grad.to_f64());
        self.buffer.push(stats.hess.to_f64());
        self.collective.allreduce_sum(&mut self.buffer)?;
        stats.grad = T::from_f64(self.buffer[0]);
        stats.hess = T::from_f64(self.buffer[1]);
        Ok(())
    }

    /// One allreduce over all explicit histograms of the batch.
    fn allreduce_histograms<T: GradientSum>(
        &mut self,
        store: &mut HistogramStore<T>,
        explicit: &[ExpandEntry],
    ) -> Result<(), CollectiveError> {
        let nbins = store.num_bins();
        self.buffer.clear();
        self.buffer.reserve(explicit.len() * nbins * 2);
        for entry in explicit {
            let hist = store.get(entry.nid).expect("explicit histogram missing");
            for s in hist {
                self.buffer.push(s.grad.to_f64());
                self.buffer.push(s.hess.to_f64());
            }
        }

        self.collective.allreduce_sum(&mut self.buffer)?;

        let mut cursor = 0;
        for entry in explicit {
            let hist = store.get_mut(entry.nid).expect("explicit histogram missing");
            for s in hist {
                s.grad = T::from_f64(self.buffer[cursor]);
                s.hess = T::from_f64(self.buffer[cursor + 1]);
                cursor += 2;
            }
        }
        Ok(())
    }
}
