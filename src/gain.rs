//! Gain and leaf-weight computation.
//!
//! The evaluator is a trait seam so constrained variants (monotone bounds,
//! per-node penalties) can slot in without touching split enumeration. The
//! stock [`RegularizedEvaluator`] implements the standard second-order
//! objective with L1/L2 regularization:
//!
//! ```text
//! gain(G, H)  = ThresholdL1(G, α)² / (H + λ)
//! weight(G,H) = -ThresholdL1(G, α) / (H + λ)
//! ```
//!
//! A split's loss change is `gain(left) + gain(right) - gain(parent)`,
//! computed by the caller so the parent term is evaluated once per node.

use crate::grads::{GradStats, GradientSum};

/// Node- and feature-aware gain oracle used by split enumeration.
///
/// `nid` and `fid` are provided so implementations can apply per-node or
/// per-feature adjustments; [`RegularizedEvaluator`] ignores them.
pub trait GainEvaluator<T: GradientSum>: Send + Sync {
    /// Structure score of a (hypothetical) leaf holding `stats`.
    fn calc_gain(&self, nid: u32, stats: &GradStats<T>) -> f32;

    /// Optimal leaf weight for `stats`.
    fn calc_weight(&self, nid: u32, stats: &GradStats<T>) -> f32;

    /// Combined children score for a candidate split of node `nid` on
    /// feature `fid`. The parent's score is subtracted by the caller.
    fn calc_split_gain(
        &self,
        nid: u32,
        fid: u32,
        left: &GradStats<T>,
        right: &GradStats<T>,
    ) -> f32 {
        let _ = fid;
        self.calc_gain(nid, left) + self.calc_gain(nid, right)
    }
}

/// L1/L2-regularized second-order evaluator.
#[derive(Clone, Copy, Debug)]
pub struct RegularizedEvaluator {
    /// L2 regularization on leaf weights.
    pub lambda: f32,
    /// L1 regularization on leaf weights.
    pub alpha: f32,
}

impl Default for RegularizedEvaluator {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            alpha: 0.0,
        }
    }
}

impl RegularizedEvaluator {
    pub fn new(lambda: f32, alpha: f32) -> Self {
        Self { lambda, alpha }
    }
}

/// Soft thresholding for L1 regularization.
#[inline]
fn soft_threshold(g: f32, alpha: f32) -> f32 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

impl<T: GradientSum> GainEvaluator<T> for RegularizedEvaluator {
    #[inline]
    fn calc_gain(&self, _nid: u32, stats: &GradStats<T>) -> f32 {
        let h = stats.hess_f32() + self.lambda;
        if h <= 0.0 {
            return 0.0;
        }
        let g = soft_threshold(stats.grad_f32(), self.alpha);
        g * g / h
    }

    #[inline]
    fn calc_weight(&self, _nid: u32, stats: &GradStats<T>) -> f32 {
        let h = stats.hess_f32() + self.lambda;
        if h <= 0.0 {
            return 0.0;
        }
        -soft_threshold(stats.grad_f32(), self.alpha) / h
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn stats(grad: f32, hess: f32) -> GradStats<f64> {
        GradStats::new(f64::from(grad), f64::from(hess))
    }

    #[test]
    fn gain_matches_closed_form() {
        let eval = RegularizedEvaluator::new(1.0, 0.0);
        // G²/(H+λ) = 4 / 3
        assert_relative_eq!(eval.calc_gain(0, &stats(-2.0, 2.0)), 4.0 / 3.0);
    }

    #[test]
    fn weight_opposes_gradient() {
        let eval = RegularizedEvaluator::new(1.0, 0.0);
        assert_relative_eq!(eval.calc_weight(0, &stats(-2.0, 3.0)), 0.5);
        assert_relative_eq!(eval.calc_weight(0, &stats(2.0, 3.0)), -0.5);
    }

    #[test]
    fn l1_shrinks_small_gradients_to_zero() {
        let eval = RegularizedEvaluator::new(1.0, 1.0);
        assert_eq!(eval.calc_gain(0, &stats(0.5, 1.0)), 0.0);
        assert_eq!(eval.calc_weight(0, &stats(0.5, 1.0)), 0.0);
        // Above the threshold the magnitude is reduced by alpha.
        assert_relative_eq!(eval.calc_weight(0, &stats(3.0, 1.0)), -1.0);
    }

    #[test]
    fn split_gain_sums_children() {
        let eval = RegularizedEvaluator::default();
        let left = stats(-2.0, 2.0);
        let right = stats(2.0, 2.0);
        let combined =
            GainEvaluator::<f64>::calc_split_gain(&eval, 0, 0, &left, &right);
        let expected = eval.calc_gain(0, &left) + eval.calc_gain(0, &right);
        assert_relative_eq!(combined, expected);
    }

    #[test]
    fn nonpositive_hessian_yields_zero() {
        let eval = RegularizedEvaluator::new(0.0, 0.0);
        assert_eq!(eval.calc_gain(0, &stats(1.0, 0.0)), 0.0);
        assert_eq!(eval.calc_weight(0, &stats(1.0, -1.0)), 0.0);
    }
}
