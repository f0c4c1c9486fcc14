//! Updater configuration surface.
//!
//! All validation is eager and host-side: [`UpdaterParams::validate`] runs
//! before any parallel work is submitted, so a bad configuration can never
//! leave a half-built histogram or row partition behind.

use crate::error::ConfigError;

/// Tree growth policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowPolicy {
    /// Expand level by level (requires a bounded `max_depth`).
    #[default]
    DepthWise,
    /// Always expand the highest-gain leaf next.
    LossGuide,
}

/// Row sampling method. Only uniform Bernoulli sampling is supported;
/// gradient-based sampling belongs to a different backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMethod {
    /// Independent Bernoulli(subsample) coin per row.
    #[default]
    Uniform,
    /// Unsupported here; rejected by validation.
    GradientBased,
}

impl SamplingMethod {
    fn name(self) -> &'static str {
        match self {
            SamplingMethod::Uniform => "uniform",
            SamplingMethod::GradientBased => "gradient_based",
        }
    }
}

/// Configuration for the histogram updater.
#[derive(Debug, Clone)]
pub struct UpdaterParams {
    /// Maximum tree depth; 0 = unlimited (then `max_leaves` must bound growth).
    pub max_depth: u32,
    /// Maximum leaf count; 0 = unlimited (then `max_depth` must bound growth).
    pub max_leaves: u32,
    /// Node expansion policy.
    pub grow_policy: GrowPolicy,
    /// Row subsampling rate in (0, 1].
    pub subsample: f32,
    /// Row sampling method; only [`SamplingMethod::Uniform`] is accepted.
    pub sampling_method: SamplingMethod,
    /// Minimum hessian sum required on each side of a split.
    pub min_child_weight: f32,
    /// Feature sampling rate per tree, in (0, 1].
    pub colsample_bytree: f32,
    /// Feature sampling rate per depth level, in (0, 1].
    pub colsample_bylevel: f32,
    /// Feature sampling rate per node, in (0, 1].
    pub colsample_bynode: f32,
    /// Base seed for row and column sampling streams.
    pub seed: u64,
}

impl Default for UpdaterParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_leaves: 0,
            grow_policy: GrowPolicy::DepthWise,
            subsample: 1.0,
            sampling_method: SamplingMethod::Uniform,
            min_child_weight: 1.0,
            colsample_bytree: 1.0,
            colsample_bylevel: 1.0,
            colsample_bynode: 1.0,
            seed: 0,
        }
    }
}

impl UpdaterParams {
    /// Validate the whole configuration.
    ///
    /// Checked before any device work starts; an error aborts the call
    /// immediately with a descriptive message.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 && self.max_leaves == 0 {
            return Err(ConfigError::DepthAndLeavesUnlimited);
        }
        if self.grow_policy == GrowPolicy::DepthWise && self.max_depth == 0 {
            return Err(ConfigError::DepthWiseNeedsMaxDepth);
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ConfigError::InvalidSubsample(self.subsample));
        }
        if self.subsample < 1.0 && self.sampling_method != SamplingMethod::Uniform {
            return Err(ConfigError::UnsupportedSamplingMethod(
                self.sampling_method.name(),
            ));
        }
        if !(self.min_child_weight >= 0.0) {
            return Err(ConfigError::InvalidMinChildWeight(self.min_child_weight));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(ConfigError::InvalidColsampleBytree(self.colsample_bytree));
        }
        if !(self.colsample_bylevel > 0.0 && self.colsample_bylevel <= 1.0) {
            return Err(ConfigError::InvalidColsampleBylevel(self.colsample_bylevel));
        }
        if !(self.colsample_bynode > 0.0 && self.colsample_bynode <= 1.0) {
            return Err(ConfigError::InvalidColsampleBynode(self.colsample_bynode));
        }
        Ok(())
    }

    /// Check if row subsampling is configured.
    #[inline]
    pub fn has_row_sampling(&self) -> bool {
        self.subsample < 1.0
    }

    /// Check if any column sampling is configured.
    #[inline]
    pub fn has_col_sampling(&self) -> bool {
        self.colsample_bytree < 1.0 || self.colsample_bylevel < 1.0 || self.colsample_bynode < 1.0
    }
}
