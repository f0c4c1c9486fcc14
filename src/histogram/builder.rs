//! Row-parallel histogram accumulation.

use rayon::prelude::*;

use crate::grads::{GradStats, GradientPair, GradientSum};
use crate::quantize::{BinIndex, QuantizedMatrix};

/// Minimum rows a shard must carry before another shard is worth spawning.
const MIN_ROWS_PER_SHARD: usize = 256;

/// Builds one node's histogram from its row set.
///
/// Rows are split into contiguous chunks; each chunk accumulates into a
/// private scratch histogram, and the shards are reduced bin-parallel into
/// the destination. Accumulation order within a shard follows the row set
/// and the shard reduction order is fixed, so the result is deterministic
/// for a given row set and thread count.
pub struct HistogramBuilder<T: GradientSum> {
    nbins: usize,
    /// `num_shards * nbins` flat scratch, reused across builds.
    scratch: Vec<GradStats<T>>,
}

impl<T: GradientSum> HistogramBuilder<T> {
    pub fn new() -> Self {
        Self {
            nbins: 0,
            scratch: Vec::new(),
        }
    }

    /// Reset for a new tree with `nbins` global bins.
    pub fn init(&mut self, nbins: usize) {
        self.nbins = nbins;
        self.scratch.clear();
    }

    /// Accumulate `rows` of `matrix` into `hist`, which is overwritten.
    ///
    /// An empty row set yields an explicitly zeroed histogram, so a child
    /// that received no rows still has valid (all-zero) statistics.
    pub fn build<B: BinIndex>(
        &mut self,
        matrix: &QuantizedMatrix<B>,
        gpair: &[GradientPair],
        rows: &[u32],
        hist: &mut [GradStats<T>],
    ) {
        debug_assert_eq!(hist.len(), self.nbins);
        hist.fill(GradStats::default());
        if rows.is_empty() {
            return;
        }

        let num_shards = rayon::current_num_threads()
            .min(rows.len().div_ceil(MIN_ROWS_PER_SHARD))
            .max(1);
        if num_shards == 1 {
            accumulate(matrix, gpair, rows, hist);
            return;
        }

        self.scratch.clear();
        self.scratch
            .resize(num_shards * self.nbins, GradStats::default());

        let nbins = self.nbins;
        let chunk_size = rows.len().div_ceil(num_shards);
        let writer = ShardWriter::new(&mut self.scratch, nbins);

        rayon::scope(|s| {
            for (shard, chunk) in rows.chunks(chunk_size).enumerate() {
                let writer = writer;
                s.spawn(move |_| {
                    // SAFETY: each shard index is used by exactly one task,
                    // so the scratch regions are disjoint.
                    let shard_hist = unsafe { writer.shard_mut(shard) };
                    accumulate(matrix, gpair, chunk, shard_hist);
                });
            }
        });

        // Fixed-order shard reduction, parallel over bins.
        let scratch = &self.scratch;
        hist.par_iter_mut().enumerate().for_each(|(bin, out)| {
            for shard in 0..num_shards {
                *out += scratch[shard * nbins + bin];
            }
        });
    }
}

impl<T: GradientSum> Default for HistogramBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Serial accumulation of a row chunk into one histogram.
fn accumulate<T: GradientSum, B: BinIndex>(
    matrix: &QuantizedMatrix<B>,
    gpair: &[GradientPair],
    rows: &[u32],
    hist: &mut [GradStats<T>],
) {
    let cuts = matrix.cuts();
    let num_features = cuts.num_features();

    for &row in rows {
        let pair = gpair[row as usize];
        let codes = matrix.row_codes(row);
        for fid in 0..num_features {
            let (offset, end) = cuts.feature_range(fid);
            if offset == end {
                continue;
            }
            let bin = offset + codes[fid as usize].to_usize();
            debug_assert!(bin < end);
            // SAFETY: matrix construction validated every code against its
            // feature's bin count, and zero-bin features are skipped above,
            // so `bin` lies inside the feature's range.
            unsafe { hist.get_unchecked_mut(bin) }.add_pair(pair);
        }
    }
}

/// Wrapper for parallel writes to per-shard scratch regions.
///
/// Encapsulates the invariant that each shard index is handed to exactly
/// one task, so the `nbins`-sized regions never alias.
#[derive(Clone, Copy)]
struct ShardWriter<T: GradientSum> {
    ptr: *mut GradStats<T>,
    nbins: usize,
}

// SAFETY: tasks write to disjoint shard regions.
unsafe impl<T: GradientSum> Send for ShardWriter<T> {}
unsafe impl<T: GradientSum> Sync for ShardWriter<T> {}

impl<T: GradientSum> ShardWriter<T> {
    fn new(scratch: &mut [GradStats<T>], nbins: usize) -> Self {
        Self {
            ptr: scratch.as_mut_ptr(),
            nbins,
        }
    }

    /// Exclusive view of one shard's scratch histogram.
    ///
    /// # Safety
    ///
    /// `shard` must be below the shard count the scratch was sized for,
    /// and no two concurrent callers may pass the same `shard`.
    #[inline]
    unsafe fn shard_mut<'a>(&self, shard: usize) -> &'a mut [GradStats<T>] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(shard * self.nbins), self.nbins) }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::quantize::BinCuts;

    /// 4 rows x 2 features, 4 bins per feature, code == row index.
    fn small_matrix() -> QuantizedMatrix<u8> {
        let cuts = BinCuts::uniform(2, 4);
        let codes = vec![0u8, 0, 1, 1, 2, 2, 3, 3];
        QuantizedMatrix::dense(cuts, codes, 4)
    }

    fn pairs() -> Vec<GradientPair> {
        vec![
            GradientPair::new(1.0, 1.0),
            GradientPair::new(-2.0, 1.0),
            GradientPair::new(0.5, 2.0),
            GradientPair::new(3.0, 0.5),
        ]
    }

    #[test]
    fn histogram_matches_serial_sums() {
        let matrix = small_matrix();
        let gpair = pairs();
        let mut builder: HistogramBuilder<f64> = HistogramBuilder::new();
        builder.init(matrix.cuts().total_bins());

        let mut hist = vec![GradStats::default(); 8];
        builder.build(&matrix, &gpair, &[0, 1, 2, 3], &mut hist);

        // Each row lands in its own bin for both features.
        for (row, pair) in gpair.iter().enumerate() {
            assert_relative_eq!(hist[row].grad_f32(), pair.grad);
            assert_relative_eq!(hist[4 + row].grad_f32(), pair.grad);
            assert_relative_eq!(hist[row].hess_f32(), pair.hess);
        }
    }

    #[test]
    fn row_subset_only_counts_those_rows() {
        let matrix = small_matrix();
        let gpair = pairs();
        let mut builder: HistogramBuilder<f64> = HistogramBuilder::new();
        builder.init(8);

        let mut hist = vec![GradStats::default(); 8];
        builder.build(&matrix, &gpair, &[1, 3], &mut hist);

        assert_eq!(hist[0].grad, 0.0);
        assert_relative_eq!(hist[1].grad_f32(), -2.0);
        assert_relative_eq!(hist[3].grad_f32(), 3.0);
    }

    #[test]
    fn empty_row_set_zeroes_destination() {
        let matrix = small_matrix();
        let gpair = pairs();
        let mut builder: HistogramBuilder<f32> = HistogramBuilder::new();
        builder.init(8);

        let mut hist = vec![GradStats::new(9.0, 9.0); 8];
        builder.build(&matrix, &gpair, &[], &mut hist);
        assert!(hist.iter().all(|s| s.grad == 0.0 && s.hess == 0.0));
    }

    #[test]
    fn zero_bin_feature_contributes_nothing() {
        // Feature 0 has no bins; only feature 1's two bins receive rows.
        let cuts = BinCuts::new(vec![0, 0, 2], vec![1.0, 2.0], vec![0.0, 0.0]);
        let matrix = QuantizedMatrix::<u8>::new(cuts, vec![0, 0, 0, 1], 2, 2);
        let gpair = vec![GradientPair::new(1.0, 1.0), GradientPair::new(2.0, 1.0)];

        let mut builder: HistogramBuilder<f64> = HistogramBuilder::new();
        builder.init(2);
        let mut hist = vec![GradStats::default(); 2];
        builder.build(&matrix, &gpair, &[0, 1], &mut hist);

        assert_relative_eq!(hist[0].grad_f32(), 1.0);
        assert_relative_eq!(hist[1].grad_f32(), 2.0);
        assert_relative_eq!(hist[0].hess_f32() + hist[1].hess_f32(), 2.0);
    }

    #[test]
    fn sharded_build_matches_single_shard() {
        // Enough rows to trigger sharding regardless of thread count.
        let n_rows = 4 * MIN_ROWS_PER_SHARD;
        let cuts = BinCuts::uniform(1, 16);
        let codes: Vec<u8> = (0..n_rows).map(|i| (i % 16) as u8).collect();
        let matrix = QuantizedMatrix::dense(cuts, codes, n_rows);
        let gpair: Vec<GradientPair> = (0..n_rows)
            .map(|i| GradientPair::new((i % 7) as f32 - 3.0, 1.0))
            .collect();
        let rows: Vec<u32> = (0..n_rows as u32).collect();

        let mut builder: HistogramBuilder<f64> = HistogramBuilder::new();
        builder.init(16);
        let mut hist = vec![GradStats::default(); 16];
        builder.build(&matrix, &gpair, &rows, &mut hist);

        let mut expected = vec![GradStats::<f64>::default(); 16];
        accumulate(&matrix, &gpair, &rows, &mut expected);

        for (got, want) in hist.iter().zip(&expected) {
            assert_relative_eq!(got.grad, want.grad, epsilon = 1e-9);
            assert_relative_eq!(got.hess, want.hess, epsilon = 1e-9);
        }
    }
}
