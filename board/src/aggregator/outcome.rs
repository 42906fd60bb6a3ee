//! Refresh outcomes reported to callers

use serde::{Deserialize, Serialize};

use crate::models::record::Source;

/// One source that could not be fetched during a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: Source,
    pub reason: String,
}

/// Result of `Aggregator::request_refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RefreshOutcome {
    /// Every source was fetched and reconciled
    Ok,

    /// Some sources failed; their previous records were kept
    PartialFailure {
        #[serde(rename = "failedSources")]
        failed_sources: Vec<SourceFailure>,
    },

    /// Another refresh was already running; nothing was done
    AlreadyInProgress,
}

impl RefreshOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RefreshOutcome::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Ok => "ok",
            RefreshOutcome::PartialFailure { .. } => "partial-failure",
            RefreshOutcome::AlreadyInProgress => "already-in-progress",
        }
    }

    /// Sources that failed, empty unless partial
    pub fn failed_sources(&self) -> Vec<Source> {
        match self {
            RefreshOutcome::PartialFailure { failed_sources } => {
                failed_sources.iter().map(|f| f.source).collect()
            }
            _ => Vec::new(),
        }
    }
}
