//! Reconciliation of the tracked set against upstream listings

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::models::record::{DeploymentRecord, Source};

/// Result of fetching one source
#[derive(Debug, Clone)]
pub enum SourceListing {
    /// Normalized records, in upstream order
    Fetched(Vec<DeploymentRecord>),

    /// Fetch failed or timed out
    Failed(String),
}

/// Outcome of a reconciliation
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub records: Vec<DeploymentRecord>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub replaced: usize,
    pub failed_sources: Vec<(Source, String)>,
}

/// Build the next tracked set.
///
/// Fetched sources are authoritative: their listing replaces whatever was
/// tracked for them. Failed sources, and sources with no listing at all,
/// keep their previous records.
pub fn reconcile(
    previous: &[DeploymentRecord],
    listings: &BTreeMap<Source, SourceListing>,
) -> Reconciliation {
    let previous_ids: HashSet<&str> = previous.iter().map(|r| r.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = Reconciliation::default();

    for source in Source::ALL {
        match listings.get(&source) {
            Some(SourceListing::Fetched(records)) => {
                for record in records {
                    if !seen.insert(record.id.clone()) {
                        warn!(
                            "Duplicate deployment id {} from {}, keeping first occurrence",
                            record.id, source
                        );
                        continue;
                    }
                    if previous_ids.contains(record.id.as_str()) {
                        result.replaced += 1;
                    } else {
                        result.added.push(record.id.clone());
                    }
                    result.records.push(record.clone());
                }
            }
            other => {
                if let Some(SourceListing::Failed(reason)) = other {
                    result.failed_sources.push((source, reason.clone()));
                }
                for record in previous.iter().filter(|r| r.source == source) {
                    if seen.insert(record.id.clone()) {
                        result.records.push(record.clone());
                    }
                }
            }
        }
    }

    result.removed = previous
        .iter()
        .filter(|r| !seen.contains(&r.id))
        .map(|r| r.id.clone())
        .collect();

    result
}
