//! Split candidates and batched split evaluation.

mod entry;
mod evaluator;

pub use entry::SplitEntry;
pub use evaluator::{SplitEvaluator, SplitQuery, SUB_GROUP_SIZE};
