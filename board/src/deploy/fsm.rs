//! Finite state machine for deployment status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::payload::{clamp_progress, UNKNOWN_DURATION};
use crate::models::record::{DeploymentRecord, DeploymentStatus, StartedAt};

/// FSM settings
#[derive(Debug, Clone)]
pub struct FsmSettings {
    /// Progress assigned when a deployment starts running
    pub start_progress: u8,
}

impl Default for FsmSettings {
    fn default() -> Self {
        Self { start_progress: 0 }
    }
}

/// Final result of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

impl From<Outcome> for DeploymentStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => DeploymentStatus::Success,
            Outcome::Failed => DeploymentStatus::Failed,
        }
    }
}

/// Input driving a state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Signal {
    /// Deployment started; `started_at` defaults to the transition time
    Started {
        #[serde(default, rename = "startedAt")]
        started_at: Option<String>,
    },

    /// Progress advanced by `delta` percentage points
    Progress { delta: u8 },

    /// Deployment finished
    Completed {
        outcome: Outcome,
        #[serde(default)]
        duration: Option<String>,
    },
}

/// Transition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsmError {
    #[error("Invalid transition for {id}: {status} -> {signal}")]
    InvalidTransition {
        id: String,
        status: DeploymentStatus,
        signal: String,
    },
}

impl Signal {
    fn kind(&self) -> &'static str {
        match self {
            Signal::Started { .. } => "started",
            Signal::Progress { .. } => "progress",
            Signal::Completed { .. } => "completed",
        }
    }
}

/// Apply `signal` to `record`, returning the next record.
///
/// Pure: the input is never modified and `now` is the only clock.
pub fn transition(
    settings: &FsmSettings,
    record: &DeploymentRecord,
    signal: &Signal,
    now: DateTime<Utc>,
) -> Result<DeploymentRecord, FsmError> {
    let mut next = record.clone();

    match (record.status, signal) {
        // From Pending
        (DeploymentStatus::Pending, Signal::Started { started_at }) => {
            next.status = DeploymentStatus::Running;
            next.progress = Some(settings.start_progress.min(99));
            next.started_at = match started_at.as_deref() {
                Some(label) if !label.trim().is_empty() => StartedAt::parse(label),
                _ => StartedAt::At(now),
            };
            next.duration = None;
        }

        // From Running
        (DeploymentStatus::Running, Signal::Progress { delta }) => {
            let current = record.progress.unwrap_or(0);
            let advanced = current.saturating_add(*delta);
            next.progress = Some(clamp_progress(f64::from(advanced)).max(current));
        }
        (DeploymentStatus::Running, Signal::Completed { outcome, duration }) => {
            next.status = (*outcome).into();
            next.progress = None;
            next.duration = Some(match duration.as_deref() {
                Some(d) if !d.trim().is_empty() => d.trim().to_string(),
                _ => elapsed_label(&record.started_at, now),
            });
        }

        // Terminal states and everything else
        (status, signal) => {
            return Err(FsmError::InvalidTransition {
                id: record.id.clone(),
                status,
                signal: signal.kind().to_string(),
            });
        }
    }

    Ok(next)
}

/// Duration label from an absolute start to `now`
pub fn elapsed_label(started_at: &StartedAt, now: DateTime<Utc>) -> String {
    match started_at.instant() {
        Some(start) => {
            let secs = (now - start).num_seconds().max(0);
            format!("{}m {}s", secs / 60, secs % 60)
        }
        None => UNKNOWN_DURATION.to_string(),
    }
}
