//! Upstream CI/CD sources

pub mod fixture;
pub mod http;

use async_trait::async_trait;

use crate::errors::BoardError;
use crate::models::record::Source;

/// Fetches the current deployment listing of one upstream system
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Which system this fetcher reads
    fn source(&self) -> Source;

    /// Raw deployment payloads, in upstream order
    async fn fetch(&self) -> Result<Vec<serde_json::Value>, BoardError>;
}

/// Extract the listing from either a bare array or `{ "deployments": [...] }`
pub fn listing_from_body(
    source: Source,
    body: serde_json::Value,
) -> Result<Vec<serde_json::Value>, BoardError> {
    match body {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(mut map) => match map.remove("deployments") {
            Some(serde_json::Value::Array(items)) => Ok(items),
            _ => Err(BoardError::MalformedPayload(format!(
                "{} response has no deployments array",
                source
            ))),
        },
        _ => Err(BoardError::MalformedPayload(format!(
            "{} response is not a listing",
            source
        ))),
    }
}
