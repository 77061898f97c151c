// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sievarr_application::{AppState, IndexerError};
use sievarr_domain::{Indexer, IndexerId, ReleaseImplementation};
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{error_response, validation_response, ErrorResponse};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListIndexersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct IndexerRequest {
    /// Announce key releases carry in their `indexer` field
    pub identifier: String,
    pub name: String,
    pub enabled: bool,
    /// `IRC` (default), `TORZNAB`, `NEWZNAB`, `RSS` or `API`
    #[schema(value_type = String)]
    pub implementation: ReleaseImplementation,
}

impl Default for IndexerRequest {
    fn default() -> Self {
        Self::from(&Indexer::new("", ""))
    }
}

impl IndexerRequest {
    fn into_indexer(self) -> Indexer {
        let mut indexer = Indexer::new(self.identifier.trim(), self.name);
        indexer.enabled = self.enabled;
        indexer.implementation = self.implementation;
        indexer
    }
}

impl From<&Indexer> for IndexerRequest {
    fn from(indexer: &Indexer) -> Self {
        Self {
            identifier: indexer.identifier.clone(),
            name: indexer.name.clone(),
            enabled: indexer.enabled,
            implementation: indexer.implementation,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IndexerResponse {
    pub id: String,
    #[serde(flatten)]
    pub fields: IndexerRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Indexer> for IndexerResponse {
    fn from(indexer: Indexer) -> Self {
        Self {
            id: indexer.id.to_string(),
            fields: IndexerRequest::from(&indexer),
            created_at: indexer.created_at,
            updated_at: indexer.updated_at,
        }
    }
}

fn parse_id(id: &str) -> Result<IndexerId, Response> {
    Uuid::parse_str(id)
        .map(IndexerId::from_uuid)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("invalid indexer id: {id}")))
}

fn indexer_error(err: IndexerError) -> Response {
    match err {
        IndexerError::Validation(errors) => validation_response(errors),
        IndexerError::NotFound(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        IndexerError::Conflict(_) => error_response(StatusCode::CONFLICT, err.to_string()),
        IndexerError::Storage(ref source) => {
            error!(target: "api", error = %source, "indexer storage failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

/// List indexers
#[utoipa::path(
    get,
    path = "/api/v1/indexers",
    params(ListIndexersQuery),
    responses(
        (status = 200, description = "List of indexers", body = Vec<IndexerResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "indexers"
)]
pub async fn list_indexers(
    State(state): State<AppState>,
    Query(query): Query<ListIndexersQuery>,
) -> Response {
    debug!(target: "api", ?query, "listing indexers");
    match state.indexers.list(query.limit, query.offset).await {
        Ok(indexers) => Json(
            indexers
                .into_iter()
                .map(IndexerResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => indexer_error(err),
    }
}

/// Get an indexer by ID
#[utoipa::path(
    get,
    path = "/api/v1/indexers/{id}",
    params(
        ("id" = String, Path, description = "Indexer ID")
    ),
    responses(
        (status = 200, description = "Indexer found", body = IndexerResponse),
        (status = 400, description = "Malformed ID", body = ErrorResponse),
        (status = 404, description = "Indexer not found", body = ErrorResponse)
    ),
    tag = "indexers"
)]
pub async fn get_indexer(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.indexers.get(id).await {
        Ok(indexer) => Json(IndexerResponse::from(indexer)).into_response(),
        Err(err) => indexer_error(err),
    }
}

/// Register an indexer
#[utoipa::path(
    post,
    path = "/api/v1/indexers",
    request_body = IndexerRequest,
    responses(
        (status = 201, description = "Indexer created", body = IndexerResponse),
        (status = 400, description = "Invalid indexer", body = ErrorResponse),
        (status = 409, description = "Identifier already in use", body = ErrorResponse)
    ),
    tag = "indexers"
)]
pub async fn create_indexer(
    State(state): State<AppState>,
    Json(request): Json<IndexerRequest>,
) -> Response {
    debug!(target: "api", identifier = %request.identifier, "creating indexer");
    match state.indexers.create(request.into_indexer()).await {
        Ok(indexer) => (StatusCode::CREATED, Json(IndexerResponse::from(indexer))).into_response(),
        Err(err) => indexer_error(err),
    }
}

/// Replace an indexer
#[utoipa::path(
    put,
    path = "/api/v1/indexers/{id}",
    params(
        ("id" = String, Path, description = "Indexer ID")
    ),
    request_body = IndexerRequest,
    responses(
        (status = 200, description = "Indexer updated", body = IndexerResponse),
        (status = 400, description = "Invalid indexer", body = ErrorResponse),
        (status = 404, description = "Indexer not found", body = ErrorResponse),
        (status = 409, description = "Identifier already in use", body = ErrorResponse)
    ),
    tag = "indexers"
)]
pub async fn update_indexer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<IndexerRequest>,
) -> Response {
    debug!(target: "api", %id, "updating indexer");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.indexers.update(id, request.into_indexer()).await {
        Ok(indexer) => Json(IndexerResponse::from(indexer)).into_response(),
        Err(err) => indexer_error(err),
    }
}

/// Delete an indexer and its filter bindings
#[utoipa::path(
    delete,
    path = "/api/v1/indexers/{id}",
    params(
        ("id" = String, Path, description = "Indexer ID")
    ),
    responses(
        (status = 204, description = "Indexer deleted"),
        (status = 404, description = "Indexer not found", body = ErrorResponse)
    ),
    tag = "indexers"
)]
pub async fn delete_indexer(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    debug!(target: "api", %id, "deleting indexer");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.indexers.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => indexer_error(err),
    }
}
