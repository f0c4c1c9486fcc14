//! Gradient pairs and summation-precision statistics.
//!
//! Per-row inputs arrive as [`GradientPair`] (always `f32`, matching the
//! objective's output precision). Accumulation happens in [`GradStats<T>`]
//! where `T` is the configured summation precision (`f32` or `f64`), chosen
//! at compile time via the [`GradientSum`] type parameter and not switchable
//! mid-run.

use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Per-row gradient/hessian pair produced by the objective.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradientPair {
    /// First-order gradient.
    pub grad: f32,
    /// Second-order gradient (hessian).
    pub hess: f32,
}

impl GradientPair {
    /// Create a new gradient pair.
    #[inline]
    pub fn new(grad: f32, hess: f32) -> Self {
        Self { grad, hess }
    }
}

/// Summation precision for histogram and node-statistic accumulation.
///
/// Implemented for `f32` and `f64`. The whole updater is generic over this
/// type, mirroring how the storage width of bin codes is generic over
/// [`BinIndex`](crate::quantize::BinIndex).
pub trait GradientSum:
    Copy
    + Default
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + SubAssign
{
    /// Widen (or keep) an `f32` value into the summation precision.
    fn from_f32(value: f32) -> Self;
    /// Convert from `f64`, used when reading back cross-worker reductions.
    fn from_f64(value: f64) -> Self;
    /// Narrow to `f32` for gain computation (gains are always `f32`).
    fn to_f32(self) -> f32;
    /// Widen to `f64` for cross-worker reduction buffers.
    fn to_f64(self) -> f64;
}

impl GradientSum for f32 {
    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl GradientSum for f64 {
    #[inline]
    fn from_f32(value: f32) -> Self {
        f64::from(value)
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// Accumulated (gradient-sum, hessian-sum) pair.
///
/// One `GradStats` per histogram bin; also used for node totals and the
/// left/right sums of a split candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradStats<T: GradientSum> {
    /// Sum of gradients.
    pub grad: T,
    /// Sum of hessians.
    pub hess: T,
}

impl<T: GradientSum> GradStats<T> {
    /// Create from raw sums.
    #[inline]
    pub fn new(grad: T, hess: T) -> Self {
        Self { grad, hess }
    }

    /// Accumulate a per-row gradient pair.
    #[inline]
    pub fn add_pair(&mut self, pair: GradientPair) {
        self.grad += T::from_f32(pair.grad);
        self.hess += T::from_f32(pair.hess);
    }

    /// Gradient sum as `f32`.
    #[inline]
    pub fn grad_f32(&self) -> f32 {
        self.grad.to_f32()
    }

    /// Hessian sum as `f32`.
    #[inline]
    pub fn hess_f32(&self) -> f32 {
        self.hess.to_f32()
    }
}

impl<T: GradientSum> Add for GradStats<T> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            grad: self.grad + rhs.grad,
            hess: self.hess + rhs.hess,
        }
    }
}

impl<T: GradientSum> AddAssign for GradStats<T> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.grad += rhs.grad;
        self.hess += rhs.hess;
    }
}

impl<T: GradientSum> Sub for GradStats<T> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            grad: self.grad - rhs.grad,
            hess: self.hess - rhs.hess,
        }
    }
}

impl<T: GradientSum> SubAssign for GradStats<T> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.grad -= rhs.grad;
        self.hess -= rhs.hess;
    }
}
