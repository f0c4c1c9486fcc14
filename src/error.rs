//! Error taxonomy for the updater.
//!
//! There are only two recoverable-by-the-caller failure classes and neither
//! supports local retry:
//!
//! - [`ConfigError`]: an invalid parameter combination, detected eagerly on
//!   the host before any parallel work is submitted.
//! - [`CollectiveError`]: the cross-worker reduction primitive failed. A
//!   partially reduced histogram would silently corrupt the trained model,
//!   so the training step aborts with the error and no tree is produced.
//!
//! Faults inside a parallel region (the moral equivalent of a device kernel
//! raising at queue-drain time) panic and unwind through the call, which
//! likewise aborts the step without trusting partial results.

use thiserror::Error;

/// Invalid updater configuration.
///
/// Raised by [`UpdaterParams::validate`](crate::params::UpdaterParams::validate)
/// before any parallel work starts.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// max_depth and max_leaves cannot both be 0 (unlimited).
    #[error("max_depth or max_leaves cannot be both 0 (unlimited); at least one should be positive")]
    DepthAndLeavesUnlimited,

    /// Depth-wise growth requires a bounded depth.
    #[error("max_depth cannot be 0 (unlimited) when grow_policy is depthwise")]
    DepthWiseNeedsMaxDepth,

    /// subsample must be in (0, 1].
    #[error("subsample must be in (0, 1], got {0}")]
    InvalidSubsample(f32),

    /// Only uniform row sampling is supported by this engine.
    #[error("only uniform sampling is supported, got {0}")]
    UnsupportedSamplingMethod(&'static str),

    /// min_child_weight must be >= 0.
    #[error("min_child_weight must be >= 0, got {0}")]
    InvalidMinChildWeight(f32),

    /// colsample_bytree must be in (0, 1].
    #[error("colsample_bytree must be in (0, 1], got {0}")]
    InvalidColsampleBytree(f32),

    /// colsample_bylevel must be in (0, 1].
    #[error("colsample_bylevel must be in (0, 1], got {0}")]
    InvalidColsampleBylevel(f32),

    /// colsample_bynode must be in (0, 1].
    #[error("colsample_bynode must be in (0, 1], got {0}")]
    InvalidColsampleBynode(f32),
}

/// Cross-worker reduction failure.
///
/// Produced by [`Collective`](crate::collective::Collective) implementations
/// on communication errors. Always fatal for the current training step.
#[derive(Debug, Clone, Error)]
#[error("allreduce failed: {0}")]
pub struct CollectiveError(pub String);

/// Top-level error returned by every fallible updater operation.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// Invalid configuration, detected before any parallel work.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Distributed reduction failed; no partial results are trusted.
    #[error("distributed reduction failed: {0}")]
    Reduction(#[from] CollectiveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_name_the_value() {
        let err = ConfigError::InvalidSubsample(1.5);
        assert!(err.to_string().contains("1.5"));

        let err = ConfigError::UnsupportedSamplingMethod("gradient_based");
        assert!(err.to_string().contains("gradient_based"));
    }

    #[test]
    fn updater_error_wraps_both_sources() {
        let err: UpdaterError = ConfigError::DepthAndLeavesUnlimited.into();
        assert!(matches!(err, UpdaterError::Config(_)));

        let err: UpdaterError = CollectiveError("socket closed".into()).into();
        assert!(err.to_string().contains("socket closed"));
    }
}
