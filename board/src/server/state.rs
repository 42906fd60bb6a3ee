//! Server state

use std::sync::Arc;

use crate::aggregator::Aggregator;

/// Server state shared across handlers
pub struct ServerState {
    pub aggregator: Arc<Aggregator>,
}

impl ServerState {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}
