//! Batched (node, feature) split evaluation.
//!
//! Each query scans one feature's histogram slice left to right and keeps
//! the best threshold. The scan runs in two phases over fixed-size stripes
//! of bins: a per-lane inclusive prefix sum within the stripe, then a
//! serial stitch that carries the running total across stripes. The stitch
//! keeps the cumulative sum exact in a single pass, and the lane structure
//! keeps the reduction order fixed so equal-gain candidates resolve the
//! same way on every run.
//!
//! Tie-breaking is two-level and deterministic:
//! - within a query, the lane reduction prefers the lowest bin among
//!   candidates with the maximal gain;
//! - across queries, results are folded into each node's running best in
//!   ascending feature order with a strict-improvement rule, so the lowest
//!   feature id wins exact gain ties.

use rayon::prelude::*;

use crate::gain::GainEvaluator;
use crate::grads::{GradStats, GradientSum};
use crate::histogram::HistogramStore;
use crate::node::NodeEntry;
use crate::quantize::BinCuts;
use crate::sampling::{ColumnSampler, InteractionConstraints};
use crate::split::SplitEntry;
use crate::tree::ExpandEntry;

/// Lanes per scan stripe.
pub const SUB_GROUP_SIZE: usize = 16;

/// One (node, feature) unit of split-evaluation work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitQuery {
    pub nid: u32,
    pub fid: u32,
}

/// Evaluates splits for a batch of nodes.
///
/// Query and result buffers are reused across calls.
pub struct SplitEvaluator<T: GradientSum> {
    queries: Vec<SplitQuery>,
    results: Vec<SplitEntry<T>>,
}

impl<T: GradientSum> SplitEvaluator<T> {
    pub fn new() -> Self {
        Self {
            queries: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Find the best split for every node in `entries`.
    ///
    /// Each node's running best in `snode` is updated in place; a node
    /// whose candidates all fail `min_child_weight` keeps its previous
    /// best (possibly the invalid sentinel).
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_splits<E: GainEvaluator<T>>(
        &mut self,
        entries: &[ExpandEntry],
        snode: &mut [NodeEntry<T>],
        store: &HistogramStore<T>,
        cuts: &BinCuts,
        evaluator: &E,
        sampler: &ColumnSampler,
        constraints: &dyn InteractionConstraints,
        min_child_weight: f32,
    ) {
        self.queries.clear();
        for entry in entries {
            // Ascending fid order per node; the host fold depends on it.
            for fid in sampler.feature_set(entry.depth, entry.nid) {
                if constraints.query(entry.nid, fid) {
                    self.queries.push(SplitQuery {
                        nid: entry.nid,
                        fid,
                    });
                }
            }
        }

        let queries = &self.queries;
        let snode_ref = &*snode;
        queries
            .par_iter()
            .map(|q| {
                let hist = store
                    .get(q.nid)
                    .expect("split evaluation requires a built histogram");
                enumerate_split(
                    hist,
                    &snode_ref[q.nid as usize],
                    q.nid,
                    q.fid,
                    cuts,
                    evaluator,
                    min_child_weight,
                )
            })
            .collect_into_vec(&mut self.results);

        // Serial fold in query order.
        for (query, result) in self.queries.iter().zip(&self.results) {
            snode[query.nid as usize].best.update(result);
        }
    }
}

impl<T: GradientSum> Default for SplitEvaluator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Best candidate of one scan lane, with the bin for tie-breaking.
#[derive(Clone, Copy)]
struct LaneBest<T: GradientSum> {
    entry: SplitEntry<T>,
    bin: usize,
}

/// Scan one feature's histogram slice for the best threshold.
fn enumerate_split<T: GradientSum, E: GainEvaluator<T>>(
    hist: &[GradStats<T>],
    snode: &NodeEntry<T>,
    nid: u32,
    fid: u32,
    cuts: &BinCuts,
    evaluator: &E,
    min_child_weight: f32,
) -> SplitEntry<T> {
    let (ibegin, iend) = cuts.feature_range(fid);
    let total = snode.stats;
    let root_gain = snode.root_gain;

    let mut lane_best = [LaneBest {
        entry: SplitEntry::<T>::none(),
        bin: usize::MAX,
    }; SUB_GROUP_SIZE];

    // Two-phase scan: inclusive prefix per stripe, serial carry across
    // stripes. `carry + prefix` at lane j is the exact cumulative sum of
    // bins [ibegin, base + j].
    let mut carry = GradStats::<T>::default();
    let mut base = ibegin;
    while base < iend {
        let stripe_end = (base + SUB_GROUP_SIZE).min(iend);
        let mut prefix = GradStats::<T>::default();
        for bin in base..stripe_end {
            prefix += hist[bin];
            let left = carry + prefix;
            let right = total - left;
            if left.hess_f32() >= min_child_weight && right.hess_f32() >= min_child_weight {
                let loss_gain = evaluator.calc_split_gain(nid, fid, &left, &right) - root_gain;
                let lane = &mut lane_best[bin - base];
                // Strict comparison within a lane: bins advance, so the
                // lowest bin among equal gains is kept.
                if loss_gain > lane.entry.loss_gain {
                    lane.entry = SplitEntry {
                        loss_gain,
                        feature: fid,
                        threshold: cuts.cut_value(bin),
                        default_left: false,
                        left_sum: left,
                        right_sum: right,
                    };
                    lane.bin = bin;
                }
            }
        }
        carry += prefix;
        base = stripe_end;
    }

    // Joint reduction keyed by (gain, bin): maximal gain, lowest bin.
    let mut best = LaneBest {
        entry: SplitEntry::none(),
        bin: usize::MAX,
    };
    for lane in &lane_best {
        if lane.entry.loss_gain > best.entry.loss_gain
            || (lane.entry.loss_gain == best.entry.loss_gain
                && lane.entry.is_valid()
                && lane.bin < best.bin)
        {
            best = *lane;
        }
    }
    best.entry
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::gain::RegularizedEvaluator;
    use crate::sampling::Unconstrained;

    /// Node entry with zero regularization stats for `stats`.
    fn node_entry(stats: GradStats<f64>, eval: &RegularizedEvaluator) -> NodeEntry<f64> {
        let mut entry = NodeEntry::default();
        entry.stats = stats;
        entry.root_gain = eval.calc_gain(0, &stats);
        entry
    }

    fn two_bin_setup() -> (HistogramStore<f64>, BinCuts) {
        // One feature, two bins.
        let cuts = BinCuts::uniform(1, 2);
        let mut store = HistogramStore::new();
        store.init(2);
        let hist = store.allocate(0);
        hist[0] = GradStats::new(-2.0, 2.0);
        hist[1] = GradStats::new(2.0, 2.0);
        (store, cuts)
    }

    #[test]
    fn finds_the_obvious_split() {
        let (store, cuts) = two_bin_setup();
        let eval = RegularizedEvaluator::new(0.0, 0.0);
        let mut snode = vec![node_entry(GradStats::new(0.0, 4.0), &eval)];
        let mut sampler = ColumnSampler::new(1, 1.0, 1.0, 1.0);
        sampler.sample_for_tree(0);

        let mut split_eval = SplitEvaluator::new();
        split_eval.evaluate_splits(
            &[ExpandEntry::new(0, 0)],
            &mut snode,
            &store,
            &cuts,
            &eval,
            &sampler,
            &Unconstrained,
            0.0,
        );

        let best = &snode[0].best;
        assert!(best.is_valid());
        assert_eq!(best.feature, 0);
        assert_relative_eq!(best.left_sum.grad_f32(), -2.0);
        assert_relative_eq!(best.right_sum.grad_f32(), 2.0);
        // gain = 4/2 + 4/2 - 0 = 4
        assert_relative_eq!(best.loss_gain, 4.0);
    }

    #[test]
    fn min_child_weight_rejects_thin_children() {
        let (store, cuts) = two_bin_setup();
        let eval = RegularizedEvaluator::new(0.0, 0.0);
        let mut snode = vec![node_entry(GradStats::new(0.0, 4.0), &eval)];
        let mut sampler = ColumnSampler::new(1, 1.0, 1.0, 1.0);
        sampler.sample_for_tree(0);

        let mut split_eval = SplitEvaluator::new();
        split_eval.evaluate_splits(
            &[ExpandEntry::new(0, 0)],
            &mut snode,
            &store,
            &cuts,
            &eval,
            &sampler,
            &Unconstrained,
            3.0,
        );

        assert!(!snode[0].best.is_valid());
    }

    #[test]
    fn equal_gain_features_resolve_to_lowest_fid() {
        // Two identical features, so every run yields the same gain for
        // fid 0 and fid 1.
        let cuts = BinCuts::uniform(2, 2);
        let mut store: HistogramStore<f64> = HistogramStore::new();
        store.init(4);
        let hist = store.allocate(0);
        hist[0] = GradStats::new(-3.0, 2.0);
        hist[1] = GradStats::new(3.0, 2.0);
        hist[2] = GradStats::new(-3.0, 2.0);
        hist[3] = GradStats::new(3.0, 2.0);

        let eval = RegularizedEvaluator::new(1.0, 0.0);
        let mut sampler = ColumnSampler::new(2, 1.0, 1.0, 1.0);
        sampler.sample_for_tree(0);

        for _ in 0..20 {
            let mut snode = vec![node_entry(GradStats::new(0.0, 4.0), &eval)];
            let mut split_eval = SplitEvaluator::new();
            split_eval.evaluate_splits(
                &[ExpandEntry::new(0, 0)],
                &mut snode,
                &store,
                &cuts,
                &eval,
                &sampler,
                &Unconstrained,
                0.0,
            );
            assert_eq!(snode[0].best.feature, 0);
        }
    }

    #[test]
    fn interaction_constraints_exclude_features() {
        let cuts = BinCuts::uniform(2, 2);
        let mut store: HistogramStore<f64> = HistogramStore::new();
        store.init(4);
        let hist = store.allocate(0);
        hist[0] = GradStats::new(-3.0, 2.0);
        hist[1] = GradStats::new(3.0, 2.0);
        hist[2] = GradStats::new(-3.0, 2.0);
        hist[3] = GradStats::new(3.0, 2.0);

        let eval = RegularizedEvaluator::new(1.0, 0.0);
        let mut sampler = ColumnSampler::new(2, 1.0, 1.0, 1.0);
        sampler.sample_for_tree(0);

        let mut snode = vec![node_entry(GradStats::new(0.0, 4.0), &eval)];
        let only_fid_one = |_nid: u32, fid: u32| fid == 1;
        let mut split_eval = SplitEvaluator::new();
        split_eval.evaluate_splits(
            &[ExpandEntry::new(0, 0)],
            &mut snode,
            &store,
            &cuts,
            &eval,
            &sampler,
            &only_fid_one,
            0.0,
        );

        assert_eq!(snode[0].best.feature, 1);
    }

    #[test]
    fn stitch_handles_ranges_longer_than_one_stripe() {
        // 40 bins forces three stripes; the gain-optimal cut sits in the
        // middle stripe so correctness depends on the carry.
        let nbins = 40;
        let cuts = BinCuts::uniform(1, nbins);
        let mut store: HistogramStore<f64> = HistogramStore::new();
        store.init(nbins);
        let hist = store.allocate(0);
        for (bin, s) in hist.iter_mut().enumerate() {
            let grad = if bin < 20 { -1.0 } else { 1.0 };
            *s = GradStats::new(grad, 1.0);
        }

        let eval = RegularizedEvaluator::new(0.0, 0.0);
        let mut snode = vec![node_entry(GradStats::new(0.0, 40.0), &eval)];
        let mut sampler = ColumnSampler::new(1, 1.0, 1.0, 1.0);
        sampler.sample_for_tree(0);

        let mut split_eval = SplitEvaluator::new();
        split_eval.evaluate_splits(
            &[ExpandEntry::new(0, 0)],
            &mut snode,
            &store,
            &cuts,
            &eval,
            &sampler,
            &Unconstrained,
            0.0,
        );

        let best = &snode[0].best;
        assert!(best.is_valid());
        assert_relative_eq!(best.left_sum.grad_f32(), -20.0);
        assert_relative_eq!(best.left_sum.hess_f32(), 20.0);
        assert_relative_eq!(best.threshold, cuts.cut_value(19));
    }
}
