//! Best-split candidate record.

use crate::grads::{GradStats, GradientSum};

/// Sentinel feature id for "no split found".
const NO_FEATURE: u32 = u32::MAX;

/// One split candidate, tracked per node as the running best.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitEntry<T: GradientSum> {
    /// Loss reduction relative to keeping the node a leaf.
    pub loss_gain: f32,
    /// Feature the split tests, [`u32::MAX`] when unset.
    pub feature: u32,
    /// Split boundary, the upper cut value of the chosen bin; rows with
    /// `value <= threshold` go left.
    pub threshold: f32,
    /// Where rows with a missing value go.
    pub default_left: bool,
    /// Gradient statistics of the left child.
    pub left_sum: GradStats<T>,
    /// Gradient statistics of the right child.
    pub right_sum: GradStats<T>,
}

impl<T: GradientSum> SplitEntry<T> {
    /// Empty candidate that any positive-gain split beats.
    pub fn none() -> Self {
        Self {
            loss_gain: 0.0,
            feature: NO_FEATURE,
            threshold: 0.0,
            default_left: false,
            left_sum: GradStats::default(),
            right_sum: GradStats::default(),
        }
    }

    /// Whether a real split was recorded.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.feature != NO_FEATURE && self.loss_gain > 0.0
    }

    /// Replace this entry if `other` is a strict improvement.
    ///
    /// Strictness matters for determinism: an equal-gain late arrival never
    /// displaces the incumbent, so the fold order over candidates (lowest
    /// feature first) decides ties.
    pub fn update(&mut self, other: &Self) -> bool {
        if other.loss_gain > self.loss_gain {
            *self = *other;
            true
        } else {
            false
        }
    }
}

impl<T: GradientSum> Default for SplitEntry<T> {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(gain: f32, feature: u32) -> SplitEntry<f64> {
        SplitEntry {
            loss_gain: gain,
            feature,
            threshold: 1.0,
            default_left: false,
            left_sum: GradStats::new(-1.0, 1.0),
            right_sum: GradStats::new(1.0, 1.0),
        }
    }

    #[test]
    fn none_is_invalid() {
        assert!(!SplitEntry::<f64>::none().is_valid());
    }

    #[test]
    fn update_requires_strict_improvement() {
        let mut best = SplitEntry::<f64>::none();
        assert!(best.update(&candidate(1.0, 3)));
        assert_eq!(best.feature, 3);

        // Equal gain from a later candidate does not replace.
        assert!(!best.update(&candidate(1.0, 1)));
        assert_eq!(best.feature, 3);

        assert!(best.update(&candidate(1.5, 1)));
        assert_eq!(best.feature, 1);
    }

    #[test]
    fn zero_gain_never_replaces_none() {
        let mut best = SplitEntry::<f64>::none();
        assert!(!best.update(&candidate(0.0, 2)));
        assert!(!best.is_valid());
    }
}
