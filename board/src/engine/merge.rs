//! Polling merge engine: one tick over the tracked set

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::deploy::fsm::{transition, FsmSettings};
use crate::deploy::signals::SignalSource;
use crate::models::record::DeploymentRecord;

/// What a tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Records that started or progressed
    pub advanced: usize,

    /// Records that reached a terminal state
    pub completed: usize,

    /// Signals the state machine refused
    pub rejected: usize,
}

impl TickReport {
    pub fn changed(&self) -> bool {
        self.advanced + self.completed > 0
    }
}

/// Advance every pending or running record by at most one signal.
///
/// `primary` is consulted first; `fallback` only when the primary has
/// nothing for a record. Terminal records pass through untouched and the
/// output has the same records in the same order as the input.
pub fn tick(
    settings: &FsmSettings,
    records: &[DeploymentRecord],
    primary: &dyn SignalSource,
    fallback: Option<&dyn SignalSource>,
    now: DateTime<Utc>,
) -> (Vec<DeploymentRecord>, TickReport) {
    let mut report = TickReport::default();

    let next = records
        .iter()
        .map(|record| {
            if record.is_terminal() {
                return record.clone();
            }

            let signal = primary
                .next_signal(record, now)
                .or_else(|| fallback.and_then(|f| f.next_signal(record, now)));
            let Some(signal) = signal else {
                return record.clone();
            };

            match transition(settings, record, &signal, now) {
                Ok(updated) => {
                    if updated.is_terminal() {
                        debug!(
                            "Deployment {} ({}) finished: {}",
                            updated.id, updated.service, updated.status
                        );
                        report.completed += 1;
                    } else {
                        report.advanced += 1;
                    }
                    updated
                }
                Err(e) => {
                    warn!("Ignoring signal: {}", e);
                    report.rejected += 1;
                    record.clone()
                }
            }
        })
        .collect();

    (next, report)
}
