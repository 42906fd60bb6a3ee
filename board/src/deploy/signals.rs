//! Signal sources feeding the state machine

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::deploy::fsm::Signal;
use crate::models::record::DeploymentRecord;

/// Supplies at most one signal per record per tick
pub trait SignalSource: Send + Sync {
    /// Next signal for `record`, or `None` when nothing new is known
    fn next_signal(&self, record: &DeploymentRecord, now: DateTime<Utc>) -> Option<Signal>;
}

/// Authoritative signals pushed by upstream systems (webhooks, pollers).
///
/// Signals queue per deployment id and are consumed by the tick that
/// applies them. Consecutive progress signals coalesce into one.
#[derive(Default)]
pub struct SignalInbox {
    queues: Mutex<HashMap<String, VecDeque<Signal>>>,
}

impl SignalInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a signal for deployment `id`
    pub fn push(&self, id: &str, signal: Signal) {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        let queue = queues.entry(id.to_string()).or_default();

        if let (Some(Signal::Progress { delta: queued }), Signal::Progress { delta }) =
            (queue.back_mut(), &signal)
        {
            *queued = queued.saturating_add(*delta);
            return;
        }
        queue.push_back(signal);
    }

    /// Number of queued signals for `id`
    pub fn pending_for(&self, id: &str) -> usize {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues.get(id).map(VecDeque::len).unwrap_or(0)
    }

    /// Drop queues for deployments outside `ids`
    pub fn retain_ids(&self, ids: &HashSet<&str>) {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues.retain(|id, _| {
            let keep = ids.contains(id.as_str());
            if !keep {
                debug!("Discarding queued signals for deployment {}", id);
            }
            keep
        });
    }

    pub fn is_empty(&self) -> bool {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues.values().all(VecDeque::is_empty)
    }
}

impl SignalSource for SignalInbox {
    fn next_signal(&self, record: &DeploymentRecord, _now: DateTime<Utc>) -> Option<Signal> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        let queue = queues.get_mut(&record.id)?;
        let signal = queue.pop_front();
        if queue.is_empty() {
            queues.remove(&record.id);
        }
        signal
    }
}
