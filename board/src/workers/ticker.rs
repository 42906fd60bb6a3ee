//! Ticker worker driving the merge engine

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use crate::aggregator::Aggregator;

/// Ticker worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between ticks
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
        }
    }
}

/// Run the ticker worker until `shutdown_signal` resolves
pub async fn run<S, F>(
    options: &Options,
    aggregator: &Aggregator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Ticker worker starting (every {:?})...", options.interval);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Ticker worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let report = aggregator.tick();
        if report.changed() {
            debug!(
                "Tick advanced {} and completed {} deployments",
                report.advanced, report.completed
            );
        }
    }
}
