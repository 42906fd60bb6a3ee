//! HTTP-backed source fetcher

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::{debug, error};
use url::Url;

use crate::errors::BoardError;
use crate::models::record::Source;
use crate::sources::{listing_from_body, SourceFetcher};

/// Reads a deployment listing from a JSON endpoint
pub struct HttpSourceFetcher {
    client: Client,
    source: Source,
    url: Url,
}

impl HttpSourceFetcher {
    /// Create a fetcher for `url`; requests fail after `timeout`
    pub fn new(source: Source, url: &str, timeout: Duration) -> Result<Self, BoardError> {
        let client = Client::builder().timeout(timeout).build()?;
        let url = Url::parse(url)?;

        Ok(Self { client, source, url })
    }

    /// Get the listing URL
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, BoardError> {
        debug!("GET {} ({})", self.url, self.source);

        let response = self
            .client
            .get(self.url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("{} listing failed: {} - {}", self.source, status, body);
            return Err(BoardError::FetchError {
                origin: self.source,
                message: format!("{}: {}", status, body),
            });
        }

        let body: serde_json::Value = response.json().await?;
        listing_from_body(self.source, body)
    }
}
