//! Gradient histograms: per-node storage, parallel accumulation, and
//! cross-worker synchronization.
//!
//! A node's histogram holds one [`GradStats`](crate::grads::GradStats)
//! accumulator per global bin. Histograms for "explicit" nodes are built
//! from rows; their siblings are derived by subtraction from the parent.

mod builder;
mod store;
mod sync;

pub use builder::HistogramBuilder;
pub use store::HistogramStore;
pub use sync::HistogramSynchronizer;
