//! In-memory source fetcher for demo mode and tests

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::errors::BoardError;
use crate::models::record::Source;
use crate::sources::SourceFetcher;

/// Serves a fixed listing, optionally failing or stalling on demand
pub struct StaticSourceFetcher {
    source: Source,
    payloads: RwLock<Vec<serde_json::Value>>,
    failure: RwLock<Option<String>>,
    delay: Duration,
}

impl StaticSourceFetcher {
    pub fn new(source: Source, payloads: Vec<serde_json::Value>) -> Self {
        Self {
            source,
            payloads: RwLock::new(payloads),
            failure: RwLock::new(None),
            delay: Duration::ZERO,
        }
    }

    /// Wait `delay` before answering each fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the listing served by later fetches
    pub fn set_payloads(&self, payloads: Vec<serde_json::Value>) {
        let mut current = self.payloads.write().unwrap_or_else(|e| e.into_inner());
        *current = payloads;
    }

    /// Make later fetches fail with `message`, or succeed again with `None`
    pub fn set_failure(&self, message: Option<String>) {
        let mut failure = self.failure.write().unwrap_or_else(|e| e.into_inner());
        *failure = message;
    }
}

#[async_trait]
impl SourceFetcher for StaticSourceFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, BoardError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failure = self.failure.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(message) = failure {
            return Err(BoardError::FetchError {
                origin: self.source,
                message,
            });
        }

        let payloads = self.payloads.read().unwrap_or_else(|e| e.into_inner());
        Ok(payloads.clone())
    }
}

/// Demo listing for one source, used when no upstream URL is configured
pub fn demo_payloads(source: Source) -> Vec<serde_json::Value> {
    match source {
        Source::Github => vec![
            json!({
                "id": "gh-1042",
                "service": "api-gateway",
                "environment": "production",
                "status": "success",
                "branch": "main",
                "commit": "a1b2c3d",
                "author": "sarah.chen",
                "startedAt": "2 hours ago",
                "duration": "4m 32s",
                "sourceUrl": "https://github.com/example/api-gateway/actions/runs/1042"
            }),
            json!({
                "id": "gh-1043",
                "service": "notification-service",
                "environment": "development",
                "status": "pending",
                "branch": "feature/email-templates",
                "commit": "e4f5a6b",
                "author": "mike.johnson",
                "startedAt": "queued"
            }),
        ],
        Source::Jenkins => vec![json!({
            "id": "jk-587",
            "service": "user-service",
            "environment": "staging",
            "status": "running",
            "progress": 65,
            "branch": "release/2.4",
            "commit": "c7d8e9f",
            "author": "alex.kumar",
            "startedAt": "5 minutes ago",
            "sourceUrl": "https://jenkins.example.com/job/user-service/587/"
        })],
        Source::Argocd => vec![json!({
            "id": "argo-payment-318",
            "service": "payment-service",
            "environment": "production",
            "status": "failed",
            "branch": "main",
            "commit": "1a2b3c4",
            "author": "emma.wilson",
            "startedAt": "1 hour ago",
            "duration": "2m 15s",
            "sourceUrl": "https://argocd.example.com/applications/payment-service"
        })],
    }
}

/// Fetchers serving the demo listing for every source
pub fn demo_fetchers() -> Vec<StaticSourceFetcher> {
    Source::ALL
        .into_iter()
        .map(|source| StaticSourceFetcher::new(source, demo_payloads(source)))
        .collect()
}
