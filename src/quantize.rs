//! Quantized feature matrix and the global bin-boundary table.
//!
//! Quantization itself happens upstream; this module only describes the
//! immutable result the updater consumes:
//!
//! - [`BinCuts`]: per-feature monotonically increasing cut boundaries,
//!   flattened into one global table with per-feature offsets.
//! - [`QuantizedMatrix`]: per-row bin codes, generic over the storage width
//!   of a code via [`BinIndex`].
//! - [`DataLayout`]: dense/sparse classification used to pick the cheapest
//!   root-statistic reduction.

/// Storage type for a quantized bin code.
///
/// Narrower types halve memory traffic during histogram building, so the
/// matrix is generic over the code width.
pub trait BinIndex: Copy + Send + Sync + 'static {
    /// Widen to a usize bin offset.
    fn to_usize(self) -> usize;
    /// Narrow from a usize bin offset.
    fn from_usize(value: usize) -> Self;
}

macro_rules! impl_bin_index {
    ($($ty:ty),*) => {
        $(impl BinIndex for $ty {
            #[inline]
            fn to_usize(self) -> usize {
                self as usize
            }
            #[inline]
            fn from_usize(value: usize) -> Self {
                debug_assert!(value <= <$ty>::MAX as usize);
                value as $ty
            }
        })*
    };
}

impl_bin_index!(u8, u16, u32);

/// Global bin-boundary table for all features.
///
/// Flattened layout: `ptrs[f]..ptrs[f + 1]` is feature `f`'s range of global
/// bin indices, `values[b]` is the upper boundary of global bin `b`, and
/// `min_values[f]` is the lower bound of feature `f`'s value range.
/// Immutable for the duration of tree growth.
#[derive(Debug, Clone)]
pub struct BinCuts {
    /// Feature -> first global bin index. Length = num_features + 1.
    ptrs: Box<[u32]>,
    /// Upper boundary per global bin. Length = total_bins.
    values: Box<[f32]>,
    /// Minimum value per feature. Length = num_features.
    min_values: Box<[f32]>,
}

impl BinCuts {
    /// Create a cut table from its flattened parts.
    ///
    /// # Panics
    ///
    /// Panics if the lengths are inconsistent or `ptrs` is not monotonic.
    pub fn new(ptrs: Vec<u32>, values: Vec<f32>, min_values: Vec<f32>) -> Self {
        assert!(!ptrs.is_empty(), "cut pointers cannot be empty");
        assert_eq!(
            min_values.len(),
            ptrs.len() - 1,
            "one min value per feature"
        );
        assert_eq!(
            values.len(),
            *ptrs.last().unwrap() as usize,
            "one cut value per global bin"
        );
        assert!(
            ptrs.windows(2).all(|w| w[0] <= w[1]),
            "cut pointers must be monotonically increasing"
        );

        Self {
            ptrs: ptrs.into_boxed_slice(),
            values: values.into_boxed_slice(),
            min_values: min_values.into_boxed_slice(),
        }
    }

    /// Build a uniform table: every feature gets `num_bins` bins with unit
    /// boundaries. Convenient for tests.
    pub fn uniform(num_features: u32, num_bins: usize) -> Self {
        let ptrs: Vec<u32> = (0..=num_features).map(|f| f * num_bins as u32).collect();
        let values: Vec<f32> = (0..num_features as usize * num_bins)
            .map(|b| (b % num_bins) as f32 + 0.5)
            .collect();
        let min_values = vec![0.0; num_features as usize];
        Self::new(ptrs, values, min_values)
    }

    /// Number of features.
    #[inline]
    pub fn num_features(&self) -> u32 {
        (self.ptrs.len() - 1) as u32
    }

    /// Total global bin count across all features.
    #[inline]
    pub fn total_bins(&self) -> usize {
        *self.ptrs.last().unwrap() as usize
    }

    /// Global bin range `[begin, end)` for a feature.
    #[inline]
    pub fn feature_range(&self, feature: u32) -> (usize, usize) {
        debug_assert!((feature as usize) < self.ptrs.len() - 1);
        (
            self.ptrs[feature as usize] as usize,
            self.ptrs[feature as usize + 1] as usize,
        )
    }

    /// Number of bins for a feature.
    #[inline]
    pub fn num_bins(&self, feature: u32) -> usize {
        let (begin, end) = self.feature_range(feature);
        end - begin
    }

    /// Upper boundary of a global bin (the split threshold at that bin).
    #[inline]
    pub fn cut_value(&self, global_bin: usize) -> f32 {
        self.values[global_bin]
    }

    /// Minimum value of a feature's range.
    #[inline]
    pub fn min_value(&self, feature: u32) -> f32 {
        self.min_values[feature as usize]
    }

    /// The feature with the fewest (but positive) bins.
    ///
    /// For dense data the histogram of any feature sums to the node total,
    /// so the cheapest slice to reduce is the one with the fewest bins.
    pub fn least_bins_feature(&self) -> Option<u32> {
        let mut best: Option<(u32, usize)> = None;
        for f in 0..self.num_features() {
            let nbins = self.num_bins(f);
            if nbins > 0 && best.map_or(true, |(_, n)| nbins < n) {
                best = Some((f, nbins));
            }
        }
        best.map(|(f, _)| f)
    }
}

/// Dense/sparse layout of the quantized matrix.
///
/// Classification follows the nonzero count: a fully populated matrix is
/// dense zero-based; a matrix dense in all features but an empty feature 0
/// is dense one-based; anything else is sparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLayout {
    /// Every (row, feature) cell is present.
    DenseZeroBased,
    /// Feature 0 carries no bins; all remaining cells are present.
    DenseOneBased,
    /// Some cells are missing.
    Sparse,
}

impl DataLayout {
    /// Classify from matrix shape and nonzero count.
    pub fn classify(n_rows: usize, n_features: usize, n_nonzero: usize, bins_f0: usize) -> Self {
        if n_rows * n_features == n_nonzero {
            DataLayout::DenseZeroBased
        } else if bins_f0 == 0 && n_rows * (n_features - 1) == n_nonzero {
            DataLayout::DenseOneBased
        } else {
            DataLayout::Sparse
        }
    }

    /// True for either dense variant.
    #[inline]
    pub fn is_dense(self) -> bool {
        !matches!(self, DataLayout::Sparse)
    }
}

/// Quantized feature matrix: one bin code per (row, feature), row-major.
///
/// A code is local to its feature; the global bin index of `(row, f)` is
/// `cuts.feature_range(f).0 + code`. The nonzero count is carried through
/// from the quantizer so the updater can classify the [`DataLayout`].
#[derive(Debug, Clone)]
pub struct QuantizedMatrix<B: BinIndex> {
    cuts: BinCuts,
    codes: Box<[B]>,
    n_rows: usize,
    n_nonzero: usize,
}

impl<B: BinIndex> QuantizedMatrix<B> {
    /// Assemble a matrix from row-major codes.
    ///
    /// # Panics
    ///
    /// Panics if `codes.len() != n_rows * cuts.num_features()` or any code
    /// is not below its feature's bin count.
    pub fn new(cuts: BinCuts, codes: Vec<B>, n_rows: usize, n_nonzero: usize) -> Self {
        let num_features = cuts.num_features() as usize;
        assert_eq!(
            codes.len(),
            n_rows * num_features,
            "row-major codes must cover every (row, feature) cell"
        );
        // Histogram accumulation indexes by `offset + code` without bounds
        // checks, so every code must be valid for its feature here. Cells of
        // zero-bin features are padding and never read.
        for (cell, code) in codes.iter().enumerate() {
            let fid = (cell % num_features) as u32;
            let nbins = cuts.num_bins(fid);
            assert!(
                nbins == 0 || code.to_usize() < nbins,
                "bin code {} out of range for feature {fid} with {nbins} bins",
                code.to_usize()
            );
        }
        Self {
            cuts,
            codes: codes.into_boxed_slice(),
            n_rows,
            n_nonzero,
        }
    }

    /// Fully dense matrix (nonzero count = rows × features).
    pub fn dense(cuts: BinCuts, codes: Vec<B>, n_rows: usize) -> Self {
        let nnz = n_rows * cuts.num_features() as usize;
        Self::new(cuts, codes, n_rows, nnz)
    }

    /// The immutable cut table.
    #[inline]
    pub fn cuts(&self) -> &BinCuts {
        &self.cuts
    }

    /// Number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of features.
    #[inline]
    pub fn num_features(&self) -> u32 {
        self.cuts.num_features()
    }

    /// Nonzero (present) cell count.
    #[inline]
    pub fn num_nonzero(&self) -> usize {
        self.n_nonzero
    }

    /// Classify the data layout of this matrix.
    pub fn layout(&self) -> DataLayout {
        DataLayout::classify(
            self.n_rows,
            self.cuts.num_features() as usize,
            self.n_nonzero,
            self.cuts.num_bins(0),
        )
    }

    /// Bin codes of one row, one per feature.
    #[inline]
    pub fn row_codes(&self, row: u32) -> &[B] {
        let nf = self.cuts.num_features() as usize;
        let start = row as usize * nf;
        &self.codes[start..start + nf]
    }

    /// Global bin index of a cell.
    #[inline]
    pub fn global_bin(&self, row: u32, feature: u32) -> usize {
        let code = self.row_codes(row)[feature as usize].to_usize();
        self.cuts.feature_range(feature).0 + code
    }
}
