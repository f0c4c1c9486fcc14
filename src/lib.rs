//! gbhist: histogram-based split finding for gradient boosted trees.
//!
//! Given a quantized feature matrix and per-row gradient/hessian pairs,
//! this crate builds per-node gradient histograms in parallel and scans
//! them for the best binary split per (node, feature) pair. It covers the
//! inner loop of a GBDT trainer: row sampling and partitioning, sharded
//! histogram accumulation with the parent-minus-child subtraction trick,
//! optional cross-worker reduction, and deterministic split selection.
//!
//! The tree grower, objective, and quantizer live outside this crate; see
//! [`HistUpdater`] for the interface they drive.

pub mod collective;
pub mod error;
pub mod gain;
pub mod grads;
pub mod histogram;
pub mod node;
pub mod params;
pub mod partition;
pub mod quantize;
pub mod sampling;
pub mod split;
pub mod tree;
pub mod updater;

pub use collective::{Collective, SingleWorker};
pub use error::{CollectiveError, ConfigError, UpdaterError};
pub use gain::{GainEvaluator, RegularizedEvaluator};
pub use grads::{GradStats, GradientPair, GradientSum};
pub use params::{GrowPolicy, SamplingMethod, UpdaterParams};
pub use quantize::{BinCuts, BinIndex, DataLayout, QuantizedMatrix};
pub use split::SplitEntry;
pub use tree::{ExpandEntry, GrowingTree};
pub use updater::HistUpdater;
