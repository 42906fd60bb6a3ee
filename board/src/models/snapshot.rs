//! Read-only views of the tracked set

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::record::{DeploymentRecord, DeploymentStatus, EnvironmentTier, Source};

/// Upstream reachability as of the last refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Online,
    Degraded {
        #[serde(rename = "failedSources")]
        failed_sources: Vec<Source>,
    },
}

impl Connectivity {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Connectivity::Degraded { .. })
    }
}

/// Immutable point-in-time view of the tracked set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub records: Vec<DeploymentRecord>,

    /// Last tick or refresh that published this view
    pub last_updated: DateTime<Utc>,

    /// Last completed refresh, if any
    pub last_refreshed: Option<DateTime<Utc>>,

    pub connectivity: Connectivity,

    /// Incremented on every publish
    pub generation: u64,
}

impl Snapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            records: Vec::new(),
            last_updated: now,
            last_refreshed: None,
            connectivity: Connectivity::Online,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DeploymentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Records matching the optional tier and source filters, in snapshot order
    pub fn filtered(
        &self,
        tier: Option<EnvironmentTier>,
        source: Option<Source>,
    ) -> Vec<DeploymentRecord> {
        self.records
            .iter()
            .filter(|r| tier.is_none_or(|t| r.tier() == t))
            .filter(|r| source.is_none_or(|s| r.source == s))
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.records.len(),
            ..Default::default()
        };
        for record in &self.records {
            match record.status {
                DeploymentStatus::Pending => summary.pending += 1,
                DeploymentStatus::Running => summary.running += 1,
                DeploymentStatus::Success => summary.success += 1,
                DeploymentStatus::Failed => summary.failed += 1,
            }
            *summary.by_environment.entry(record.tier()).or_insert(0) += 1;
            *summary.by_source.entry(record.source).or_insert(0) += 1;
        }
        summary
    }
}

/// Status counts shown in the board header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub by_environment: BTreeMap<EnvironmentTier, usize>,
    pub by_source: BTreeMap<Source, usize>,
}
