//! Merge and reconciliation logic over the tracked set

pub mod merge;
pub mod reconcile;
