//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::{RefreshOutcome, SourceFailure};
use crate::deploy::fsm::Signal;
use crate::errors::BoardError;
use crate::models::record::{DeploymentRecord, EnvironmentTier, Source};
use crate::models::snapshot::{Connectivity, Summary};
use crate::server::error::ApiError;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployboard".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Deployment list filters
#[derive(Debug, Default, Deserialize)]
pub struct DeploymentsQuery {
    pub environment: Option<String>,
    pub source: Option<String>,
}

/// Deployment list response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentsResponse {
    pub deployments: Vec<DeploymentRecord>,
    pub total: usize,
    pub last_updated: DateTime<Utc>,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub connectivity: Connectivity,
    pub generation: u64,
    pub refreshing: bool,
}

/// Snapshot of tracked deployments
pub async fn deployments_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<DeploymentsQuery>,
) -> Result<Json<DeploymentsResponse>, ApiError> {
    let tier = query
        .environment
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .map(EnvironmentTier::classify);
    let source = match query.source.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => Some(s.parse::<Source>().map_err(ApiError::InvalidInput)?),
        None => None,
    };

    let snapshot = state.aggregator.snapshot();
    let deployments = snapshot.filtered(tier, source);

    Ok(Json(DeploymentsResponse {
        total: deployments.len(),
        deployments,
        last_updated: snapshot.last_updated,
        last_refreshed: snapshot.last_refreshed,
        connectivity: snapshot.connectivity.clone(),
        generation: snapshot.generation,
        refreshing: state.aggregator.is_refreshing(),
    }))
}

/// Status counts
pub async fn summary_handler(State(state): State<Arc<ServerState>>) -> Json<Summary> {
    Json(state.aggregator.snapshot().summary())
}

/// Single deployment
pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<DeploymentRecord>, ApiError> {
    let snapshot = state.aggregator.snapshot();
    snapshot
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| BoardError::NotFound(format!("deployment {}", id)).into())
}

/// Refresh response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub outcome: String,
    pub failed_sources: Vec<SourceFailure>,
    pub total: usize,
    pub generation: u64,
}

/// Trigger a refresh against every upstream source
pub async fn refresh_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let outcome = state.aggregator.request_refresh().await;
    let status = match outcome {
        RefreshOutcome::AlreadyInProgress => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    let failed_sources = match &outcome {
        RefreshOutcome::PartialFailure { failed_sources } => failed_sources.clone(),
        _ => Vec::new(),
    };

    let snapshot = state.aggregator.snapshot();
    (
        status,
        Json(RefreshResponse {
            outcome: outcome.as_str().to_string(),
            failed_sources,
            total: snapshot.len(),
            generation: snapshot.generation,
        }),
    )
}

/// Signal accepted response
#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub accepted: bool,
    pub id: String,
}

/// Queue an upstream signal for a deployment
pub async fn signal_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    body: Result<Json<Signal>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(signal) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    info!("Received {:?} for deployment {}", signal, id);
    state.aggregator.push_signal(&id, signal)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SignalResponse { accepted: true, id }),
    ))
}
