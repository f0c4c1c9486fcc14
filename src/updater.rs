//! Orchestration of one tree's histogram builds and split searches.
//!
//! [`HistUpdater`] owns the per-tree state (row partition, histogram
//! store, node statistics) and exposes the four synchronous phases the
//! tree grower drives:
//!
//! 1. [`init_data`](HistUpdater::init_data): validate, sample rows, reset
//!    buffers for a new tree.
//! 2. [`build_histograms_loss_guide`](HistUpdater::build_histograms_loss_guide):
//!    accumulate one expanded node's histogram from rows and derive its
//!    sibling by subtraction.
//! 3. [`init_new_node`](HistUpdater::init_new_node): node totals, leaf
//!    weight, and structure score.
//! 4. [`evaluate_splits`](HistUpdater::evaluate_splits): best split per
//!    node in the batch.
//!
//! Each phase completes (including any cross-worker reduction) before it
//! returns; there is no retry, a failed phase aborts the training step.

use std::sync::Arc;

use rayon::prelude::*;

use crate::collective::{Collective, SingleWorker};
use crate::error::UpdaterError;
use crate::gain::GainEvaluator;
use crate::grads::{GradStats, GradientPair, GradientSum};
use crate::histogram::{HistogramBuilder, HistogramStore, HistogramSynchronizer};
use crate::node::NodeEntry;
use crate::params::UpdaterParams;
use crate::partition::RowSetCollection;
use crate::quantize::{BinIndex, DataLayout, QuantizedMatrix};
use crate::sampling::{ColumnSampler, InteractionConstraints, Unconstrained};
use crate::split::{SplitEntry, SplitEvaluator};
use crate::tree::{ExpandEntry, GrowingTree};

pub struct HistUpdater<T: GradientSum, E: GainEvaluator<T>> {
    params: UpdaterParams,
    evaluator: E,
    collective: Arc<dyn Collective>,
    constraints: Box<dyn InteractionConstraints>,

    row_set: RowSetCollection,
    hist: HistogramStore<T>,
    builder: HistogramBuilder<T>,
    synchronizer: HistogramSynchronizer,
    split_evaluator: SplitEvaluator<T>,
    column_sampler: ColumnSampler,
    snode: Vec<NodeEntry<T>>,

    data_layout: DataLayout,
    /// Dense data only: feature whose slice is cheapest to reduce.
    fid_least_bins: Option<u32>,
    /// Advances across trees so sampling streams never repeat.
    seed: u64,

    nodes_for_explicit: Vec<ExpandEntry>,
    nodes_for_subtraction: Vec<ExpandEntry>,
}

impl<T: GradientSum, E: GainEvaluator<T>> HistUpdater<T, E> {
    /// Validates `params` eagerly; no further configuration errors can
    /// surface after construction.
    pub fn new(params: UpdaterParams, evaluator: E) -> Result<Self, UpdaterError> {
        params.validate()?;
        let seed = params.seed;
        Ok(Self {
            params,
            evaluator,
            collective: Arc::new(SingleWorker),
            constraints: Box::new(Unconstrained),
            row_set: RowSetCollection::new(),
            hist: HistogramStore::new(),
            builder: HistogramBuilder::new(),
            synchronizer: HistogramSynchronizer::new(Arc::new(SingleWorker)),
            split_evaluator: SplitEvaluator::new(),
            column_sampler: ColumnSampler::new(0, 1.0, 1.0, 1.0),
            snode: Vec::new(),
            data_layout: DataLayout::Sparse,
            fid_least_bins: None,
            seed,
            nodes_for_explicit: Vec::new(),
            nodes_for_subtraction: Vec::new(),
        })
    }

    /// Use `collective` for cross-worker reductions.
    pub fn with_collective(mut self, collective: Arc<dyn Collective>) -> Self {
        self.synchronizer = HistogramSynchronizer::new(Arc::clone(&collective));
        self.collective = collective;
        self
    }

    /// Restrict features per node with an interaction-constraint predicate.
    pub fn with_constraints(mut self, constraints: Box<dyn InteractionConstraints>) -> Self {
        self.constraints = constraints;
        self
    }

    #[inline]
    pub fn params(&self) -> &UpdaterParams {
        &self.params
    }

    /// Whether reductions cross worker boundaries.
    #[inline]
    pub fn is_distributed(&self) -> bool {
        self.collective.is_distributed()
    }

    #[inline]
    pub fn data_layout(&self) -> DataLayout {
        self.data_layout
    }

    #[inline]
    pub fn row_set(&self) -> &RowSetCollection {
        &self.row_set
    }

    #[inline]
    pub fn node_entry(&self, nid: u32) -> &NodeEntry<T> {
        &self.snode[nid as usize]
    }

    #[inline]
    pub fn best_split(&self, nid: u32) -> &SplitEntry<T> {
        &self.snode[nid as usize].best
    }

    /// Histogram of a built node, for inspection.
    #[inline]
    pub fn histogram(&self, nid: u32) -> Option<&[GradStats<T>]> {
        self.hist.get(nid)
    }

    /// Prepare for a new tree: sample the root row set, size the
    /// histogram buffers, classify the data layout, and draw the
    /// tree-level column sample.
    pub fn init_data<B: BinIndex>(
        &mut self,
        matrix: &QuantizedMatrix<B>,
        gpair: &[GradientPair],
    ) -> Result<(), UpdaterError> {
        assert_eq!(gpair.len(), matrix.num_rows());

        let subsample = if self.params.has_row_sampling() {
            self.params.subsample
        } else {
            1.0
        };
        self.row_set.init_root(gpair, subsample, &mut self.seed);

        let cuts = matrix.cuts();
        self.hist.init(cuts.total_bins());
        self.builder.init(cuts.total_bins());

        self.data_layout = matrix.layout();
        self.fid_least_bins = if self.data_layout.is_dense() {
            Some(
                cuts.least_bins_feature()
                    .expect("dense matrix has at least one feature"),
            )
        } else {
            None
        };

        self.column_sampler = ColumnSampler::new(
            cuts.num_features(),
            self.params.colsample_bytree,
            self.params.colsample_bylevel,
            self.params.colsample_bynode,
        );
        self.column_sampler.sample_for_tree(self.seed);
        self.seed = self.seed.wrapping_add(1);

        self.snode.clear();
        self.nodes_for_explicit.clear();
        self.nodes_for_subtraction.clear();
        Ok(())
    }

    /// Build the histogram for one freshly expanded node.
    ///
    /// The entry's node is accumulated from its rows; if it has a sibling,
    /// the sibling's histogram is derived as `parent - explicit` after the
    /// (distributed) reduction, so only one child per pair touches rows.
    pub fn build_histograms_loss_guide<B: BinIndex>(
        &mut self,
        entry: ExpandEntry,
        matrix: &QuantizedMatrix<B>,
        tree: &GrowingTree,
        gpair: &[GradientPair],
    ) -> Result<(), UpdaterError> {
        self.nodes_for_explicit.clear();
        self.nodes_for_subtraction.clear();
        self.nodes_for_explicit.push(entry);
        if let Some(sibling) = tree.sibling(entry.nid) {
            self.nodes_for_subtraction
                .push(ExpandEntry::new(sibling, entry.depth));
        }

        for e in self
            .nodes_for_explicit
            .iter()
            .chain(&self.nodes_for_subtraction)
        {
            self.hist.allocate(e.nid);
        }

        for i in 0..self.nodes_for_explicit.len() {
            let nid = self.nodes_for_explicit[i].nid;
            let mut node_hist = self
                .hist
                .take(nid)
                .expect("explicit histogram allocated above");
            self.builder
                .build(matrix, gpair, self.row_set.row_set(nid), &mut node_hist);
            self.hist.put(nid, node_hist);
        }

        self.synchronizer.sync(
            &mut self.hist,
            tree,
            &self.nodes_for_explicit,
            &self.nodes_for_subtraction,
        )?;
        Ok(())
    }

    /// Compute a node's total statistics, leaf weight, and structure
    /// score.
    ///
    /// The root reduces exact totals (from the cheapest feature's
    /// histogram slice when the data is dense, otherwise from the row
    /// partition) and reconciles them across workers. Non-root nodes
    /// inherit their totals from the parent's winning split, which already
    /// carries exact child sums.
    pub fn init_new_node<B: BinIndex>(
        &mut self,
        nid: u32,
        matrix: &QuantizedMatrix<B>,
        gpair: &[GradientPair],
        tree: &GrowingTree,
    ) -> Result<(), UpdaterError> {
        self.ensure_node(nid);

        let stats = if tree.is_root(nid) {
            match self.fid_least_bins {
                // The synchronizer already reduced the root histogram
                // across workers, so the slice sum is the global total.
                Some(fid) => {
                    let (begin, end) = matrix.cuts().feature_range(fid);
                    let hist = self
                        .hist
                        .get(nid)
                        .expect("root histogram must be built before init");
                    hist[begin..end]
                        .iter()
                        .fold(GradStats::default(), |acc, s| acc + *s)
                }
                // Sparse data reduces over local rows only; reconcile the
                // partial sum across workers.
                None => {
                    let rows = self.row_set.row_set(nid);
                    let mut stats = rows
                        .par_iter()
                        .fold(GradStats::<T>::default, |mut acc, &row| {
                            acc.add_pair(gpair[row as usize]);
                            acc
                        })
                        .reduce(GradStats::default, |a, b| a + b);
                    self.synchronizer.reduce_stats(&mut stats)?;
                    stats
                }
            }
        } else {
            let parent = tree.parent(nid).expect("non-root node has a parent");
            let best = &self.snode[parent as usize].best;
            debug_assert!(best.is_valid(), "parent was split without a best split");
            if tree.is_left_child(nid) {
                best.left_sum
            } else {
                best.right_sum
            }
        };

        let parent_id = tree.parent(nid).unwrap_or(nid);
        let entry = &mut self.snode[nid as usize];
        entry.stats = stats;
        entry.weight = self.evaluator.calc_weight(parent_id, &stats);
        entry.root_gain = self.evaluator.calc_gain(parent_id, &stats);
        entry.best = SplitEntry::none();
        Ok(())
    }

    /// Find the best split for each node in `node_set`.
    pub fn evaluate_splits<B: BinIndex>(
        &mut self,
        node_set: &[ExpandEntry],
        matrix: &QuantizedMatrix<B>,
    ) {
        for entry in node_set {
            debug_assert!((entry.nid as usize) < self.snode.len());
        }
        self.split_evaluator.evaluate_splits(
            node_set,
            &mut self.snode,
            &self.hist,
            matrix.cuts(),
            &self.evaluator,
            &self.column_sampler,
            self.constraints.as_ref(),
            self.params.min_child_weight,
        );
    }

    /// Repartition a node's rows after its best split is applied to the
    /// tree. Rows route by their quantized code against the split bin.
    pub fn apply_split<B: BinIndex>(
        &mut self,
        nid: u32,
        left: u32,
        right: u32,
        matrix: &QuantizedMatrix<B>,
    ) -> (usize, usize) {
        let best = self.snode[nid as usize].best;
        assert!(best.is_valid(), "cannot apply an invalid split");
        let fid = best.feature;
        let cuts = matrix.cuts();
        let threshold = best.threshold;
        self.row_set.add_split(nid, left, right, |row| {
            let bin = matrix.global_bin(row, fid);
            cuts.cut_value(bin) <= threshold
        })
    }

    fn ensure_node(&mut self, nid: u32) {
        if self.snode.len() <= nid as usize {
            self.snode.resize_with(nid as usize + 1, NodeEntry::default);
        }
    }
}
