//! Raw upstream deployment payloads and their normalization

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::BoardError;
use crate::models::record::{DeploymentRecord, DeploymentStatus, Source, StartedAt};

/// Duration label used when a terminal payload does not report one
pub const UNKNOWN_DURATION: &str = "unknown";

/// A deployment as reported by an upstream source, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeployment {
    #[serde(default)]
    pub id: Option<serde_json::Value>,

    #[serde(default)]
    pub service: Option<String>,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub progress: Option<f64>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub commit: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default, alias = "started_at")]
    pub started_at: Option<String>,

    #[serde(default)]
    pub duration: Option<String>,

    #[serde(default, alias = "source_url", alias = "url")]
    pub source_url: Option<String>,
}

impl RawDeployment {
    /// Validate and build a record attributed to `source`
    pub fn normalize(self, source: Source) -> Result<DeploymentRecord, BoardError> {
        let id = match self.id {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(BoardError::MalformedPayload("missing id".to_string())),
        };

        let service = required(&id, "service", self.service)?;
        let environment = required(&id, "environment", self.environment)?;
        let branch = required(&id, "branch", self.branch)?;
        let commit = required(&id, "commit", self.commit)?;
        let author = required(&id, "author", self.author)?;

        let status: DeploymentStatus = required(&id, "status", self.status)?
            .parse()
            .map_err(|e: String| BoardError::MalformedPayload(format!("{}: {}", id, e)))?;

        let started_at = match self.started_at.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => StartedAt::parse(s),
            _ if status == DeploymentStatus::Pending => StartedAt::Queued,
            _ => {
                return Err(BoardError::MalformedPayload(format!(
                    "{}: missing startedAt",
                    id
                )))
            }
        };

        let progress = match status {
            DeploymentStatus::Running => Some(clamp_progress(self.progress.unwrap_or(0.0))),
            _ => None,
        };

        let duration = if status.is_terminal() {
            Some(
                self.duration
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_DURATION.to_string()),
            )
        } else {
            None
        };

        Ok(DeploymentRecord {
            id,
            service,
            environment,
            status,
            progress,
            branch,
            commit,
            author,
            started_at,
            duration,
            source_url: self.source_url.filter(|u| !u.trim().is_empty()),
            source,
        })
    }
}

fn required(id: &str, field: &str, value: Option<String>) -> Result<String, BoardError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(BoardError::MalformedPayload(format!(
            "{}: missing {}",
            id, field
        ))),
    }
}

/// Running progress is kept below 100; reaching 100 means completion
pub fn clamp_progress(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 99.0) as u8
}

/// Normalize one source's listing, skipping payloads that cannot be mapped
pub fn normalize_listing(source: Source, payloads: Vec<serde_json::Value>) -> Vec<DeploymentRecord> {
    let mut records = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let raw: RawDeployment = match serde_json::from_value(payload) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping malformed {} payload: {}", source, e);
                continue;
            }
        };
        match raw.normalize(source) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping {} deployment: {}", source, e),
        }
    }
    records
}
