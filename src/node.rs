//! Per-node training statistics.

use crate::grads::{GradStats, GradientSum};
use crate::split::SplitEntry;

/// Statistics the updater tracks for every tree node.
///
/// `weight` and `root_gain` are derived from `stats` by the gain evaluator
/// when the node is initialized; `best` accumulates the winning split
/// candidate during evaluation.
#[derive(Debug, Clone)]
pub struct NodeEntry<T: GradientSum> {
    /// Total gradient statistics over the node's rows.
    pub stats: GradStats<T>,
    /// Optimal leaf weight if the node stays a leaf.
    pub weight: f32,
    /// Structure score of the node, subtracted from candidate splits.
    pub root_gain: f32,
    /// Best split found so far.
    pub best: SplitEntry<T>,
}

impl<T: GradientSum> Default for NodeEntry<T> {
    fn default() -> Self {
        Self {
            stats: GradStats::default(),
            weight: 0.0,
            root_gain: 0.0,
            best: SplitEntry::none(),
        }
    }
}
