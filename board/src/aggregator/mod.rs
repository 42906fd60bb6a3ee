//! Deployment status aggregator

pub mod board;
pub mod outcome;

pub use board::{Aggregator, AggregatorOptions};
pub use outcome::{RefreshOutcome, SourceFailure};
