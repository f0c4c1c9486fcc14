//! Row partition: per-node row index sets and root-level sampling.
//!
//! All row indices live in one contiguous buffer; each node owns a
//! `[begin, end)` range within it (following LightGBM-style partitioning).
//! Sibling ranges are disjoint and the union over live leaves equals the
//! post-sampling row set.
//!
//! # Compaction ordering
//!
//! Root initialization filters rows (negative hessians, subsampling misses)
//! with an atomic fetch-and-increment counter: every eligible row claims a
//! unique output slot concurrently. The claimed *set* is deterministic; the
//! *order* of claims across workers is not, and no stabilizing sort is
//! applied. Downstream correctness never depends on row order within a
//! node.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rand::distributions::Bernoulli;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::grads::GradientPair;

/// Per-node row index ranges over one shared index buffer.
#[derive(Debug, Default)]
pub struct RowSetCollection {
    /// Row indices, partitioned in place as nodes split.
    indices: Vec<u32>,
    /// `[begin, end)` into `indices` per node id.
    ranges: Vec<(u32, u32)>,
}

impl RowSetCollection {
    /// Empty collection; call [`init_root`](Self::init_root) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the root node's row set from the gradient pairs.
    ///
    /// With `subsample == 1` the result is the identity row order unless
    /// some row carries a negative hessian, in which case eligible rows are
    /// compacted out-of-order (see module docs). With `subsample < 1` each
    /// row draws an independent Bernoulli coin from a stream keyed by
    /// `(seed, row_index)`; the row is kept iff its hessian is non-negative
    /// and the coin lands heads. The seed is advanced by the row count so
    /// repeated calls across boosting iterations use fresh streams.
    ///
    /// Returns the number of retained rows.
    pub fn init_root(&mut self, gpair: &[GradientPair], subsample: f32, seed: &mut u64) -> usize {
        let num_rows = gpair.len();
        self.indices.clear();
        self.indices.resize(num_rows, 0);

        let retained = if subsample < 1.0 {
            let base_seed = *seed;
            *seed = seed.wrapping_add(num_rows as u64);
            self.init_sampled(gpair, subsample, base_seed)
        } else {
            self.init_identity(gpair)
        };

        self.indices.truncate(retained);
        self.ranges.clear();
        self.ranges.push((0, retained as u32));
        retained
    }

    /// Identity order, compacting out negative-hessian rows if any exist.
    fn init_identity(&mut self, gpair: &[GradientPair]) -> usize {
        let num_rows = gpair.len();
        let has_neg_hess = AtomicBool::new(false);

        self.indices
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, slot)| {
                *slot = i as u32;
                if gpair[i].hess < 0.0 {
                    has_neg_hess.store(true, Ordering::Relaxed);
                }
            });

        if !has_neg_hess.load(Ordering::Relaxed) {
            return num_rows;
        }

        let counter = AtomicUsize::new(0);
        let writer = SlotClaimWriter::new(&mut self.indices);
        (0..num_rows as u32).into_par_iter().for_each(|i| {
            if gpair[i as usize].hess >= 0.0 {
                let slot = counter.fetch_add(1, Ordering::Relaxed);
                // SAFETY: fetch_add hands out each slot exactly once and
                // slots never exceed the buffer length.
                unsafe { writer.claim(slot, i) };
            }
        });
        counter.into_inner()
    }

    /// Bernoulli subsampling with a per-row keyed stream.
    fn init_sampled(&mut self, gpair: &[GradientPair], subsample: f32, base_seed: u64) -> usize {
        let num_rows = gpair.len();
        let coin = Bernoulli::new(f64::from(subsample)).expect("subsample validated in (0, 1]");

        let counter = AtomicUsize::new(0);
        let writer = SlotClaimWriter::new(&mut self.indices);
        (0..num_rows as u32).into_par_iter().for_each(|i| {
            // Keying the generator by (seed, row) makes the decision for a
            // row independent of scheduling and of every other row.
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(base_seed.wrapping_add(u64::from(i)));
            if gpair[i as usize].hess >= 0.0 && rng.sample(coin) {
                let slot = counter.fetch_add(1, Ordering::Relaxed);
                // SAFETY: same unique-slot argument as in init_identity.
                unsafe { writer.claim(slot, i) };
            }
        });
        counter.into_inner()
    }

    /// Row indices belonging to a node.
    #[inline]
    pub fn row_set(&self, nid: u32) -> &[u32] {
        let (begin, end) = self.ranges[nid as usize];
        &self.indices[begin as usize..end as usize]
    }

    /// Number of rows in a node.
    #[inline]
    pub fn size(&self, nid: u32) -> usize {
        let (begin, end) = self.ranges[nid as usize];
        (end - begin) as usize
    }

    /// Number of nodes with an assigned range.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.ranges.len()
    }

    /// Repartition a node's rows into two children after a split is chosen.
    ///
    /// Rows for which `goes_left` holds move to the front of the node's
    /// range (stable within each side). Ranges for `left_id` and `right_id`
    /// are registered; the parent's range is left untouched so histogram
    /// subtraction can still reference it.
    ///
    /// This is the external node-splitting step's entry point; the engine
    /// itself never reorders a node's rows after initialization.
    pub fn add_split(
        &mut self,
        nid: u32,
        left_id: u32,
        right_id: u32,
        goes_left: impl Fn(u32) -> bool,
    ) -> (usize, usize) {
        let (begin, end) = self.ranges[nid as usize];
        let slice = &mut self.indices[begin as usize..end as usize];

        // Stable in-place partition: left-going rows keep relative order.
        let mut left_count = 0;
        for i in 0..slice.len() {
            if goes_left(slice[i]) {
                slice[left_count..=i].rotate_right(1);
                left_count += 1;
            }
        }

        let mid = begin + left_count as u32;
        let max_id = left_id.max(right_id) as usize;
        if self.ranges.len() <= max_id {
            self.ranges.resize(max_id + 1, (0, 0));
        }
        self.ranges[left_id as usize] = (begin, mid);
        self.ranges[right_id as usize] = (mid, end);
        (left_count, (end - mid) as usize)
    }
}

/// Wrapper for concurrent writes to counter-claimed slots.
///
/// Encapsulates the invariant that each slot index is claimed by exactly
/// one worker via an atomic counter, so writes never alias.
#[derive(Clone, Copy)]
struct SlotClaimWriter {
    ptr: *mut u32,
    len: usize,
}

// SAFETY: writes go to unique counter-claimed slots, never aliased.
unsafe impl Send for SlotClaimWriter {}
unsafe impl Sync for SlotClaimWriter {}

impl SlotClaimWriter {
    fn new(buffer: &mut [u32]) -> Self {
        Self {
            ptr: buffer.as_mut_ptr(),
            len: buffer.len(),
        }
    }

    /// Write a row index into a claimed slot.
    ///
    /// # Safety
    ///
    /// `slot` must come from a shared atomic counter so no two callers
    /// write the same slot, and must be below the buffer length.
    #[inline]
    unsafe fn claim(&self, slot: usize, row: u32) {
        debug_assert!(slot < self.len);
        unsafe { *self.ptr.add(slot) = row };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(hessians: &[f32]) -> Vec<GradientPair> {
        hessians.iter().map(|&h| GradientPair::new(0.0, h)).collect()
    }

    #[test]
    fn identity_when_all_hessians_nonnegative() {
        let gpair = pairs(&[1.0; 8]);
        let mut rows = RowSetCollection::new();
        let mut seed = 0;

        let n = rows.init_root(&gpair, 1.0, &mut seed);
        assert_eq!(n, 8);
        assert_eq!(rows.row_set(0), (0..8).collect::<Vec<u32>>());
        assert_eq!(seed, 0, "seed advances only when sampling");
    }

    #[test]
    fn negative_hessian_rows_compacted_out() {
        let gpair = pairs(&[1.0, 1.0, -1.0, 1.0, 1.0]);
        let mut rows = RowSetCollection::new();
        let mut seed = 0;

        let n = rows.init_root(&gpair, 1.0, &mut seed);
        assert_eq!(n, 4);

        let mut kept: Vec<u32> = rows.row_set(0).to_vec();
        kept.sort_unstable();
        assert_eq!(kept, vec![0, 1, 3, 4]);
    }

    #[test]
    fn sampling_is_reproducible_per_seed() {
        let gpair = pairs(&[1.0; 200]);
        let mut rows_a = RowSetCollection::new();
        let mut rows_b = RowSetCollection::new();

        let mut seed = 42;
        rows_a.init_root(&gpair, 0.5, &mut seed);
        let mut seed = 42;
        rows_b.init_root(&gpair, 0.5, &mut seed);

        let mut a: Vec<u32> = rows_a.row_set(0).to_vec();
        let mut b: Vec<u32> = rows_b.row_set(0).to_vec();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn sampling_advances_seed_by_row_count() {
        let gpair = pairs(&[1.0; 100]);
        let mut rows = RowSetCollection::new();
        let mut seed = 7;

        rows.init_root(&gpair, 0.5, &mut seed);
        assert_eq!(seed, 107);

        // The next call must draw from a fresh stream.
        let first: Vec<u32> = {
            let mut s = 7;
            let mut r = RowSetCollection::new();
            r.init_root(&gpair, 0.5, &mut s);
            r.row_set(0).to_vec()
        };
        rows.init_root(&gpair, 0.5, &mut seed);
        let second: Vec<u32> = rows.row_set(0).to_vec();

        let mut a = first;
        let mut b = second;
        a.sort_unstable();
        b.sort_unstable();
        assert_ne!(a, b, "streams across iterations should differ");
    }

    #[test]
    fn sampling_excludes_negative_hessians() {
        let mut hessians = vec![1.0; 64];
        hessians[10] = -2.0;
        hessians[40] = -0.5;
        let gpair = pairs(&hessians);

        let mut rows = RowSetCollection::new();
        let mut seed = 1;
        rows.init_root(&gpair, 0.9, &mut seed);

        assert!(!rows.row_set(0).contains(&10));
        assert!(!rows.row_set(0).contains(&40));
    }

    #[test]
    fn sampled_count_tracks_expectation() {
        let gpair = pairs(&[1.0; 2000]);
        let mut rows = RowSetCollection::new();

        let mut total = 0usize;
        let trials = 20;
        let mut seed = 0u64;
        for _ in 0..trials {
            total += rows.init_root(&gpair, 0.3, &mut seed);
        }
        let mean = total as f64 / trials as f64;
        let expected = 0.3 * 2000.0;
        // ~3 sigma over the pooled trials.
        assert!(
            (mean - expected).abs() < 60.0,
            "mean {mean} too far from expectation {expected}"
        );
    }

    #[test]
    fn add_split_partitions_rows() {
        let gpair = pairs(&[1.0; 8]);
        let mut rows = RowSetCollection::new();
        let mut seed = 0;
        rows.init_root(&gpair, 1.0, &mut seed);

        let (left, right) = rows.add_split(0, 1, 2, |row| row % 2 == 0);
        assert_eq!((left, right), (4, 4));
        assert_eq!(rows.row_set(1), &[0, 2, 4, 6]);
        assert_eq!(rows.row_set(2), &[1, 3, 5, 7]);
        // Parent range still spans both children.
        assert_eq!(rows.size(0), 8);
    }
}
