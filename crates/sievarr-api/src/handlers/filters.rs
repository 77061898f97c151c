// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sievarr_application::{AppState, FilterError};
use sievarr_domain::{DuplicateProfileId, Filter, FilterId, IndexerId};
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{error_response, validation_response, ErrorResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListFiltersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Filter criteria. Omitted fields take the defaults of a new filter:
/// enabled, priority 0, no profile, no indexers and no criteria.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FilterRequest {
    pub name: String,
    pub enabled: bool,
    /// Higher priorities are evaluated first
    pub priority: i32,
    /// Duplicate profile checked against this filter's history
    pub duplicate_profile_id: Option<String>,
    /// Indexer IDs the filter listens to
    pub indexers: Vec<String>,
    /// e.g. `700MB`, `4 GiB`
    pub min_size: String,
    pub max_size: String,
    pub use_regex: bool,
    pub match_releases: String,
    pub except_releases: String,
    pub match_release_groups: String,
    pub except_release_groups: String,
    pub shows: String,
    pub seasons: String,
    pub episodes: String,
    pub years: String,
    pub months: String,
    pub days: String,
    pub resolutions: Vec<String>,
    pub codecs: Vec<String>,
    pub sources: Vec<String>,
    pub containers: Vec<String>,
    pub match_hdr: Vec<String>,
    pub except_hdr: Vec<String>,
    pub match_language: Vec<String>,
    pub except_language: Vec<String>,
    pub match_categories: String,
    pub except_categories: String,
    pub match_uploaders: String,
    pub except_uploaders: String,
    pub tags: String,
    pub except_tags: String,
    pub freeleech: bool,
}

impl Default for FilterRequest {
    fn default() -> Self {
        Self::from(&Filter::default())
    }
}

impl FilterRequest {
    fn into_filter(self) -> Result<Filter, Response> {
        let duplicate_profile_id = self
            .duplicate_profile_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| parse_uuid(id, "duplicate profile").map(DuplicateProfileId::from_uuid))
            .transpose()?;
        let indexers = self
            .indexers
            .iter()
            .map(|id| parse_uuid(id, "indexer").map(IndexerId::from_uuid))
            .collect::<Result<Vec<_>, _>>()?;

        let mut filter = Filter::new(self.name);
        filter.enabled = self.enabled;
        filter.priority = self.priority;
        filter.duplicate_profile_id = duplicate_profile_id;
        filter.indexers = indexers;
        filter.min_size = self.min_size;
        filter.max_size = self.max_size;
        filter.use_regex = self.use_regex;
        filter.match_releases = self.match_releases;
        filter.except_releases = self.except_releases;
        filter.match_release_groups = self.match_release_groups;
        filter.except_release_groups = self.except_release_groups;
        filter.shows = self.shows;
        filter.seasons = self.seasons;
        filter.episodes = self.episodes;
        filter.years = self.years;
        filter.months = self.months;
        filter.days = self.days;
        filter.resolutions = self.resolutions;
        filter.codecs = self.codecs;
        filter.sources = self.sources;
        filter.containers = self.containers;
        filter.match_hdr = self.match_hdr;
        filter.except_hdr = self.except_hdr;
        filter.match_language = self.match_language;
        filter.except_language = self.except_language;
        filter.match_categories = self.match_categories;
        filter.except_categories = self.except_categories;
        filter.match_uploaders = self.match_uploaders;
        filter.except_uploaders = self.except_uploaders;
        filter.tags = self.tags;
        filter.except_tags = self.except_tags;
        filter.freeleech = self.freeleech;
        Ok(filter)
    }
}

impl From<&Filter> for FilterRequest {
    fn from(f: &Filter) -> Self {
        Self {
            name: f.name.clone(),
            enabled: f.enabled,
            priority: f.priority,
            duplicate_profile_id: f.duplicate_profile_id.map(|id| id.to_string()),
            indexers: f.indexers.iter().map(ToString::to_string).collect(),
            min_size: f.min_size.clone(),
            max_size: f.max_size.clone(),
            use_regex: f.use_regex,
            match_releases: f.match_releases.clone(),
            except_releases: f.except_releases.clone(),
            match_release_groups: f.match_release_groups.clone(),
            except_release_groups: f.except_release_groups.clone(),
            shows: f.shows.clone(),
            seasons: f.seasons.clone(),
            episodes: f.episodes.clone(),
            years: f.years.clone(),
            months: f.months.clone(),
            days: f.days.clone(),
            resolutions: f.resolutions.clone(),
            codecs: f.codecs.clone(),
            sources: f.sources.clone(),
            containers: f.containers.clone(),
            match_hdr: f.match_hdr.clone(),
            except_hdr: f.except_hdr.clone(),
            match_language: f.match_language.clone(),
            except_language: f.except_language.clone(),
            match_categories: f.match_categories.clone(),
            except_categories: f.except_categories.clone(),
            match_uploaders: f.match_uploaders.clone(),
            except_uploaders: f.except_uploaders.clone(),
            tags: f.tags.clone(),
            except_tags: f.except_tags.clone(),
            freeleech: f.freeleech,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FilterResponse {
    pub id: String,
    #[serde(flatten)]
    pub fields: FilterRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Filter> for FilterResponse {
    fn from(filter: Filter) -> Self {
        Self {
            id: filter.id.to_string(),
            fields: FilterRequest::from(&filter),
            created_at: filter.created_at,
            updated_at: filter.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FilterIndexerRequest {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn parse_uuid(id: &str, kind: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id.trim())
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("invalid {kind} id: {id}")))
}

fn parse_id(id: &str) -> Result<FilterId, Response> {
    parse_uuid(id, "filter").map(FilterId::from_uuid)
}

fn filter_error(err: FilterError) -> Response {
    match err {
        FilterError::Validation(errors) => validation_response(errors),
        FilterError::NotFound(_) | FilterError::IndexerNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, err.to_string())
        }
        FilterError::Storage(ref source) => {
            error!(target: "api", error = %source, "filter storage failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List filters
#[utoipa::path(
    get,
    path = "/api/v1/filters",
    params(ListFiltersQuery),
    responses(
        (status = 200, description = "List of filters", body = Vec<FilterResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "filters"
)]
pub async fn list_filters(
    State(state): State<AppState>,
    Query(query): Query<ListFiltersQuery>,
) -> Response {
    debug!(target: "api", ?query, "listing filters");
    match state.filters.list(query.limit, query.offset).await {
        Ok(filters) => Json(
            filters
                .into_iter()
                .map(FilterResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => filter_error(err),
    }
}

/// Get a filter by ID
#[utoipa::path(
    get,
    path = "/api/v1/filters/{id}",
    params(
        ("id" = String, Path, description = "Filter ID")
    ),
    responses(
        (status = 200, description = "Filter found", body = FilterResponse),
        (status = 400, description = "Malformed ID", body = ErrorResponse),
        (status = 404, description = "Filter not found", body = ErrorResponse)
    ),
    tag = "filters"
)]
pub async fn get_filter(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    debug!(target: "api", %id, "fetching filter");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.filters.get(id).await {
        Ok(filter) => Json(FilterResponse::from(filter)).into_response(),
        Err(err) => filter_error(err),
    }
}

/// Create a filter
#[utoipa::path(
    post,
    path = "/api/v1/filters",
    request_body = FilterRequest,
    responses(
        (status = 201, description = "Filter created", body = FilterResponse),
        (status = 400, description = "Invalid filter or unknown reference", body = ErrorResponse)
    ),
    tag = "filters"
)]
pub async fn create_filter(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Response {
    debug!(target: "api", name = %request.name, "creating filter");
    let filter = match request.into_filter() {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    match state.filters.create(filter).await {
        Ok(filter) => (StatusCode::CREATED, Json(FilterResponse::from(filter))).into_response(),
        Err(err) => filter_error(err),
    }
}

/// Replace a filter, including its indexer list
#[utoipa::path(
    put,
    path = "/api/v1/filters/{id}",
    params(
        ("id" = String, Path, description = "Filter ID")
    ),
    request_body = FilterRequest,
    responses(
        (status = 200, description = "Filter updated", body = FilterResponse),
        (status = 400, description = "Invalid filter or unknown reference", body = ErrorResponse),
        (status = 404, description = "Filter not found", body = ErrorResponse)
    ),
    tag = "filters"
)]
pub async fn update_filter(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FilterRequest>,
) -> Response {
    debug!(target: "api", %id, "updating filter");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let filter = match request.into_filter() {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    match state.filters.update(id, filter).await {
        Ok(filter) => Json(FilterResponse::from(filter)).into_response(),
        Err(err) => filter_error(err),
    }
}

/// Delete a filter and its release history
#[utoipa::path(
    delete,
    path = "/api/v1/filters/{id}",
    params(
        ("id" = String, Path, description = "Filter ID")
    ),
    responses(
        (status = 204, description = "Filter deleted"),
        (status = 404, description = "Filter not found", body = ErrorResponse)
    ),
    tag = "filters"
)]
pub async fn delete_filter(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    debug!(target: "api", %id, "deleting filter");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.filters.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => filter_error(err),
    }
}

/// Bind an indexer to a filter, or toggle an existing binding
#[utoipa::path(
    put,
    path = "/api/v1/filters/{id}/indexers/{indexer_id}",
    params(
        ("id" = String, Path, description = "Filter ID"),
        ("indexer_id" = String, Path, description = "Indexer ID")
    ),
    request_body = FilterIndexerRequest,
    responses(
        (status = 204, description = "Indexer bound"),
        (status = 400, description = "Malformed ID", body = ErrorResponse),
        (status = 404, description = "Filter or indexer not found", body = ErrorResponse)
    ),
    tag = "filters"
)]
pub async fn connect_indexer(
    State(state): State<AppState>,
    Path((id, indexer_id)): Path<(String, String)>,
    Json(request): Json<FilterIndexerRequest>,
) -> Response {
    debug!(target: "api", %id, %indexer_id, enabled = request.enabled, "binding indexer");
    let (id, indexer_id) = match (parse_id(&id), parse_uuid(&indexer_id, "indexer")) {
        (Ok(id), Ok(indexer_id)) => (id, IndexerId::from_uuid(indexer_id)),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state
        .filters
        .connect_indexer(id, indexer_id, request.enabled)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => filter_error(err),
    }
}

/// Remove an indexer binding from a filter
#[utoipa::path(
    delete,
    path = "/api/v1/filters/{id}/indexers/{indexer_id}",
    params(
        ("id" = String, Path, description = "Filter ID"),
        ("indexer_id" = String, Path, description = "Indexer ID")
    ),
    responses(
        (status = 204, description = "Indexer unbound"),
        (status = 400, description = "Malformed ID", body = ErrorResponse),
        (status = 404, description = "Filter not found", body = ErrorResponse)
    ),
    tag = "filters"
)]
pub async fn disconnect_indexer(
    State(state): State<AppState>,
    Path((id, indexer_id)): Path<(String, String)>,
) -> Response {
    debug!(target: "api", %id, %indexer_id, "unbinding indexer");
    let (id, indexer_id) = match (parse_id(&id), parse_uuid(&indexer_id, "indexer")) {
        (Ok(id), Ok(indexer_id)) => (id, IndexerId::from_uuid(indexer_id)),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state.filters.disconnect_indexer(id, indexer_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => filter_error(err),
    }
}
