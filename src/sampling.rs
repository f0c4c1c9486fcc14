//! Column (feature) sampling and interaction constraints.
//!
//! Column sampling cascades at three granularities: once per tree
//! (`colsample_bytree`), per depth level (`colsample_bylevel`), and per
//! node (`colsample_bynode`). Each stage samples from the previous stage's
//! output, so the node-level set is the intersection of all three.
//!
//! Level and node sets are not stored; they are re-derived from the tree
//! seed with fixed mixing constants, so any (depth, node) query is
//! reproducible without tracking tree-growth order.

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Seed mixing constants (splitmix64 / golden-ratio increments).
const DEPTH_MIX: u64 = 0x9E3779B97F4A7C15;
const NODE_MIX: u64 = 0x517CC1B727220A95;

/// Per-tree feature sampler.
#[derive(Debug, Clone)]
pub struct ColumnSampler {
    num_features: u32,
    bytree: f32,
    bylevel: f32,
    bynode: f32,
    /// Features kept for the current tree, ascending.
    tree_features: Vec<u32>,
    /// Seed fixed at `sample_for_tree`, keys level/node derivation.
    tree_seed: u64,
}

impl ColumnSampler {
    /// Ratios must already be validated to lie in (0, 1].
    pub fn new(num_features: u32, bytree: f32, bylevel: f32, bynode: f32) -> Self {
        debug_assert!(bytree > 0.0 && bytree <= 1.0);
        debug_assert!(bylevel > 0.0 && bylevel <= 1.0);
        debug_assert!(bynode > 0.0 && bynode <= 1.0);
        Self {
            num_features,
            bytree,
            bylevel,
            bynode,
            tree_features: Vec::new(),
            tree_seed: 0,
        }
    }

    /// Draw the tree-level feature set. Call once per tree.
    pub fn sample_for_tree(&mut self, seed: u64) {
        self.tree_seed = seed;
        if self.bytree >= 1.0 {
            self.tree_features = (0..self.num_features).collect();
        } else {
            let all: Vec<u32> = (0..self.num_features).collect();
            let k = keep_count(all.len(), self.bytree);
            self.tree_features = sample_from_slice(&all, k, seed);
        }
    }

    /// Features allowed for a node, ascending by feature id.
    pub fn feature_set(&self, depth: u32, nid: u32) -> Vec<u32> {
        let mut features = self.tree_features.clone();

        if self.bylevel < 1.0 {
            let seed = self.level_seed(depth);
            let k = keep_count(features.len(), self.bylevel);
            features = sample_from_slice(&features, k, seed);
        }
        if self.bynode < 1.0 {
            let seed = self
                .level_seed(depth)
                .wrapping_add(u64::from(nid).wrapping_mul(NODE_MIX));
            let k = keep_count(features.len(), self.bynode);
            features = sample_from_slice(&features, k, seed);
        }
        features
    }

    #[inline]
    fn level_seed(&self, depth: u32) -> u64 {
        self.tree_seed
            .wrapping_add(u64::from(depth).wrapping_mul(DEPTH_MIX))
    }
}

#[inline]
fn keep_count(n: usize, ratio: f32) -> usize {
    ((n as f32 * ratio).ceil() as usize).clamp(1, n.max(1))
}

/// Sample `k` items without replacement via partial Fisher-Yates.
///
/// Returns sorted values so downstream scans visit features in ascending
/// id order, which the split tie-break relies on.
fn sample_from_slice(items: &[u32], k: usize, seed: u64) -> Vec<u32> {
    if k >= items.len() {
        return items.to_vec();
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut pool: Vec<u32> = items.to_vec();
    for i in 0..k {
        let j = rng.gen_range(i..pool.len());
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool.sort_unstable();
    pool
}

/// Per-node feature admissibility, supplied by the caller.
///
/// Implementations typically encode interaction constraints (features that
/// may only co-occur with certain ancestors). [`Unconstrained`] admits
/// everything.
pub trait InteractionConstraints: Send + Sync {
    /// Whether `fid` may be used to split node `nid`.
    fn query(&self, nid: u32, fid: u32) -> bool;
}

/// Admits every (node, feature) pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

impl InteractionConstraints for Unconstrained {
    #[inline]
    fn query(&self, _nid: u32, _fid: u32) -> bool {
        true
    }
}

impl<F> InteractionConstraints for F
where
    F: Fn(u32, u32) -> bool + Send + Sync,
{
    #[inline]
    fn query(&self, nid: u32, fid: u32) -> bool {
        self(nid, fid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sampling_keeps_all_features() {
        let mut sampler = ColumnSampler::new(10, 1.0, 1.0, 1.0);
        sampler.sample_for_tree(42);
        assert_eq!(sampler.feature_set(3, 7), (0..10).collect::<Vec<u32>>());
    }

    #[test]
    fn bytree_keeps_requested_fraction() {
        let mut sampler = ColumnSampler::new(10, 0.5, 1.0, 1.0);
        sampler.sample_for_tree(42);
        let features = sampler.feature_set(0, 0);
        assert_eq!(features.len(), 5);
        assert!(features.windows(2).all(|w| w[0] < w[1]));
        assert!(features.iter().all(|&f| f < 10));
    }

    #[test]
    fn node_sets_are_reproducible() {
        let mut sampler = ColumnSampler::new(32, 0.8, 0.7, 0.6);
        sampler.sample_for_tree(7);
        assert_eq!(sampler.feature_set(2, 5), sampler.feature_set(2, 5));
    }

    #[test]
    fn cascade_is_nested() {
        let mut sampler = ColumnSampler::new(50, 0.6, 0.6, 1.0);
        sampler.sample_for_tree(11);
        let tree: Vec<u32> = sampler.feature_set(0, 0);
        for f in &tree {
            assert!(sampler.tree_features.contains(f));
        }
        assert!(tree.len() < sampler.tree_features.len());
    }

    #[test]
    fn different_nodes_can_differ() {
        let mut sampler = ColumnSampler::new(64, 1.0, 1.0, 0.5);
        sampler.sample_for_tree(3);
        // Node seeds are mixed per node id; with 64 features two nodes
        // drawing 32 each are essentially never identical.
        assert_ne!(sampler.feature_set(1, 1), sampler.feature_set(1, 2));
    }

    #[test]
    fn closure_constraint_filters() {
        let allow_even = |_nid: u32, fid: u32| fid % 2 == 0;
        assert!(allow_even.query(0, 4));
        assert!(!allow_even.query(0, 3));
        assert!(Unconstrained.query(9, 9));
    }
}
