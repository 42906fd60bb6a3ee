//! Periodic refresh worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, RefreshOutcome};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Refresh worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between refreshes while all sources answer
    pub interval: Duration,

    /// Backoff applied after partial failures, capped at `interval`
    pub cooldown: CooldownOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Delay before the next refresh given the current failure streak.
///
/// A failing source is retried sooner than the regular interval, backing
/// off exponentially until it reaches the interval again.
pub fn next_delay(options: &Options, err_streak: u32) -> Duration {
    if err_streak == 0 {
        return options.interval;
    }
    calc_exp_backoff(&options.cooldown, err_streak - 1).min(options.interval)
}

/// Run the refresh worker until `shutdown_signal` resolves
pub async fn run<S, F>(
    options: &Options,
    aggregator: &Aggregator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Refresh worker starting...");
    let mut err_streak: u32 = 0;

    loop {
        let delay = next_delay(options, err_streak);

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Refresh worker shutting down...");
                return;
            }
            _ = sleep_fn(delay) => {}
        }

        // a refresh abandoned here on shutdown commits nothing
        let outcome = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Refresh worker shutting down...");
                return;
            }
            outcome = aggregator.request_refresh() => outcome,
        };

        match outcome {
            RefreshOutcome::Ok => {
                debug!("Scheduled refresh completed");
                err_streak = 0;
            }
            RefreshOutcome::PartialFailure { failed_sources } => {
                err_streak = err_streak.saturating_add(1);
                warn!(
                    "Scheduled refresh degraded ({} failing sources, streak {})",
                    failed_sources.len(),
                    err_streak
                );
            }
            RefreshOutcome::AlreadyInProgress => {
                debug!("Refresh already running, skipping scheduled refresh");
            }
        }
    }
}
