// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sievarr_application::{try_parse_release_name, AppState, MatchResult, ProcessError};
use sievarr_domain::{Release, ReleaseProtocol};
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

use super::{error_response, validation_response, ErrorResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateReleaseRequest {
    pub release_name: String,
    /// Identifier of the announcing indexer
    pub indexer: String,
    /// Size in bytes, if known
    pub size: Option<u64>,
    /// `torrent` (default) or `usenet`
    pub protocol: Option<String>,
    pub info_hash: Option<String>,
}

impl EvaluateReleaseRequest {
    fn into_release(self) -> Result<Release, Response> {
        let mut release = try_parse_release_name(&self.release_name)
            .map_err(|err| error_response(StatusCode::BAD_REQUEST, err.to_string()))?;
        release.indexer = self.indexer;
        release.size = self.size.unwrap_or(0);
        release.info_hash = self.info_hash.unwrap_or_default();
        release.protocol = match self.protocol.as_deref().map(str::to_ascii_lowercase) {
            Some(p) if p == "usenet" => ReleaseProtocol::Usenet,
            _ => ReleaseProtocol::Torrent,
        };
        Ok(release)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MatchResultResponse {
    pub filter_id: Option<String>,
    pub filter_name: Option<String>,
    pub accepted: bool,
    pub duplicate: bool,
    pub rejections: Vec<String>,
}

impl From<MatchResult> for MatchResultResponse {
    fn from(result: MatchResult) -> Self {
        Self {
            filter_id: result.filter_id.map(|id| id.to_string()),
            filter_name: result.filter_name,
            accepted: result.accepted,
            duplicate: result.duplicate,
            rejections: result.rejections,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListReleasesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReleaseResponse {
    pub id: String,
    pub release_name: String,
    pub indexer: String,
    pub filter_id: Option<String>,
    pub filter_status: String,
    pub title: String,
    pub year: u32,
    pub season: u32,
    pub episode: u32,
    pub resolution: String,
    pub source: String,
    pub group: String,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
}

impl From<Release> for ReleaseResponse {
    fn from(release: Release) -> Self {
        Self {
            id: release.id.to_string(),
            release_name: release.release_name,
            indexer: release.indexer,
            filter_id: release.filter_id.map(|id| id.to_string()),
            filter_status: release.filter_status.to_string(),
            title: release.title,
            year: release.year,
            season: release.season,
            episode: release.episode,
            resolution: release.resolution,
            source: release.source,
            group: release.group,
            size: release.size,
            timestamp: release.timestamp,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteReleasesQuery {
    /// Age in hours; older releases and their history are removed
    pub older_than: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteReleasesResponse {
    pub deleted: u64,
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> Response {
    error!(target: "api", error = %err, "{}", context);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

// ============================================================================
// Handlers
// ============================================================================

/// Evaluate a release against its indexer's filters without storing it
#[utoipa::path(
    post,
    path = "/api/v1/releases/evaluate",
    request_body = EvaluateReleaseRequest,
    responses(
        (status = 200, description = "Evaluation result", body = MatchResultResponse),
        (status = 400, description = "Invalid release", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "releases"
)]
pub async fn evaluate_release(
    State(state): State<AppState>,
    Json(request): Json<EvaluateReleaseRequest>,
) -> Response {
    debug!(target: "api", release = %request.release_name, indexer = %request.indexer, "evaluating release");
    let release = match request.into_release() {
        Ok(release) => release,
        Err(response) => return response,
    };
    match state.matcher().evaluate(&release).await {
        Ok(result) => Json(MatchResultResponse::from(result)).into_response(),
        Err(err) => internal_error("release evaluation failed", err),
    }
}

/// Evaluate a release and store it under the accepting filter
#[utoipa::path(
    post,
    path = "/api/v1/releases/process",
    request_body = EvaluateReleaseRequest,
    responses(
        (status = 200, description = "Processing result", body = MatchResultResponse),
        (status = 400, description = "Invalid release", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "releases"
)]
pub async fn process_release(
    State(state): State<AppState>,
    Json(request): Json<EvaluateReleaseRequest>,
) -> Response {
    debug!(target: "api", release = %request.release_name, indexer = %request.indexer, "processing release");
    let release = match request.into_release() {
        Ok(release) => release,
        Err(response) => return response,
    };
    match state.processor.process(release).await {
        Ok(result) => Json(MatchResultResponse::from(result)).into_response(),
        Err(ProcessError::Validation(errors)) => validation_response(errors),
        Err(err) => internal_error("release processing failed", err),
    }
}

/// Most recently stored releases
#[utoipa::path(
    get,
    path = "/api/v1/releases",
    params(ListReleasesQuery),
    responses(
        (status = 200, description = "Stored releases, newest first", body = Vec<ReleaseResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "releases"
)]
pub async fn list_releases(
    State(state): State<AppState>,
    Query(query): Query<ListReleasesQuery>,
) -> Response {
    match state.releases.list_recent(query.limit.clamp(1, 500)).await {
        Ok(releases) => Json(
            releases
                .into_iter()
                .map(ReleaseResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => internal_error("listing releases failed", err),
    }
}

/// Delete releases older than the given age
#[utoipa::path(
    delete,
    path = "/api/v1/releases",
    params(DeleteReleasesQuery),
    responses(
        (status = 200, description = "Number of releases deleted", body = DeleteReleasesResponse),
        (status = 400, description = "Missing or invalid age"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "releases"
)]
pub async fn delete_releases(
    State(state): State<AppState>,
    Query(query): Query<DeleteReleasesQuery>,
) -> Response {
    match state.releases.delete_older_than(query.older_than).await {
        Ok(deleted) => {
            info!(target: "api", older_than = query.older_than, deleted, "deleted old releases");
            Json(DeleteReleasesResponse { deleted }).into_response()
        }
        Err(err) => internal_error("deleting releases failed", err),
    }
}
