//! Normalized deployment record

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One tracked deployment, normalized across CI/CD sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Opaque identifier, stable across updates to the same deployment
    pub id: String,

    /// Deployed service name
    pub service: String,

    /// Target tier as reported upstream (free-form)
    pub environment: String,

    /// Lifecycle status
    pub status: DeploymentStatus,

    /// Percentage in [0, 100), only while running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    pub branch: String,
    pub commit: String,
    pub author: String,

    /// Start timestamp label, or `queued`
    pub started_at: StartedAt,

    /// Completion duration label, only once terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Deep link to the originating system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Originating CI/CD system
    pub source: Source,
}

impl DeploymentRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Display grouping for the free-form environment
    pub fn tier(&self) -> EnvironmentTier {
        EnvironmentTier::classify(&self.environment)
    }

    /// Check the field invariants that every published record must hold
    pub fn check_invariants(&self) -> Result<(), String> {
        let running = self.status == DeploymentStatus::Running;
        if running != self.progress.is_some() {
            return Err(format!(
                "{}: progress must be present iff running (status {}, progress {:?})",
                self.id, self.status, self.progress
            ));
        }
        if let Some(progress) = self.progress {
            if progress >= 100 {
                return Err(format!("{}: running progress {} out of range", self.id, progress));
            }
        }
        if self.status.is_terminal() != self.duration.is_some() {
            return Err(format!(
                "{}: duration must be present iff terminal (status {})",
                self.id, self.status
            ));
        }
        if self.environment.trim().is_empty() {
            return Err(format!("{}: empty environment", self.id));
        }
        Ok(())
    }
}

/// Deployment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "queued" => Ok(DeploymentStatus::Pending),
            "running" | "in_progress" => Ok(DeploymentStatus::Running),
            "success" | "succeeded" => Ok(DeploymentStatus::Success),
            "failed" | "failure" => Ok(DeploymentStatus::Failed),
            _ => Err(format!("Invalid deployment status: {}", s)),
        }
    }
}

/// Originating CI/CD system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Github,
    Jenkins,
    Argocd,
}

impl Source {
    /// Canonical order used when assembling a reconciled snapshot
    pub const ALL: [Source; 3] = [Source::Github, Source::Jenkins, Source::Argocd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Github => "github",
            Source::Jenkins => "jenkins",
            Source::Argocd => "argocd",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" | "github-actions" | "github_actions" => Ok(Source::Github),
            "jenkins" => Ok(Source::Jenkins),
            "argocd" | "argo-cd" | "argo" => Ok(Source::Argocd),
            _ => Err(format!("Invalid source: {}", s)),
        }
    }
}

/// Environment grouping used by the display layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentTier {
    Production,
    Staging,
    Development,
    Other,
}

impl EnvironmentTier {
    pub fn classify(environment: &str) -> Self {
        match environment.trim().to_lowercase().as_str() {
            "production" | "prod" => EnvironmentTier::Production,
            "staging" | "stage" => EnvironmentTier::Staging,
            "development" | "dev" => EnvironmentTier::Development,
            _ => EnvironmentTier::Other,
        }
    }
}

/// When a deployment started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartedAt {
    /// Not started yet
    Queued,

    /// Absolute instant (parsed from RFC 3339)
    At(DateTime<Utc>),

    /// Free-form label such as "2 minutes ago"
    Label(String),
}

impl StartedAt {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("queued") {
            return StartedAt::Queued;
        }
        match DateTime::parse_from_rfc3339(trimmed) {
            Ok(at) => StartedAt::At(at.with_timezone(&Utc)),
            Err(_) => StartedAt::Label(trimmed.to_string()),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, StartedAt::Queued)
    }

    /// Absolute start instant, if known
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            StartedAt::At(at) => Some(*at),
            _ => None,
        }
    }
}

impl fmt::Display for StartedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartedAt::Queued => f.write_str("queued"),
            StartedAt::At(at) => f.write_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            StartedAt::Label(label) => f.write_str(label),
        }
    }
}

impl Serialize for StartedAt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StartedAt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Err(serde::de::Error::custom("empty startedAt"));
        }
        Ok(StartedAt::parse(&s))
    }
}
