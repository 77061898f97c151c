// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sievarr_application::{AppState, ProfileError};
use sievarr_domain::{DuplicateProfileId, DuplicateReleaseProfile};
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{error_response, validation_response, ErrorResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListProfilesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Name plus one toggle per comparable release field. Omitted toggles are
/// off.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DuplicateProfileRequest {
    pub name: String,
    pub protocol: bool,
    pub release_name: bool,
    pub hash: bool,
    pub title: bool,
    pub sub_title: bool,
    pub year: bool,
    pub month: bool,
    pub day: bool,
    pub source: bool,
    pub resolution: bool,
    pub codec: bool,
    pub container: bool,
    /// Dynamic range (HDR, DV, ...)
    pub hdr: bool,
    pub audio: bool,
    pub group: bool,
    pub season: bool,
    pub episode: bool,
    pub website: bool,
    pub proper: bool,
    pub repack: bool,
    pub edition: bool,
    pub language: bool,
    pub hybrid: bool,
}

impl DuplicateProfileRequest {
    fn into_profile(self) -> DuplicateReleaseProfile {
        let mut profile = DuplicateReleaseProfile::new(self.name);
        profile.protocol = self.protocol;
        profile.release_name = self.release_name;
        profile.hash = self.hash;
        profile.title = self.title;
        profile.sub_title = self.sub_title;
        profile.year = self.year;
        profile.month = self.month;
        profile.day = self.day;
        profile.source = self.source;
        profile.resolution = self.resolution;
        profile.codec = self.codec;
        profile.container = self.container;
        profile.dynamic_range = self.hdr;
        profile.audio = self.audio;
        profile.group = self.group;
        profile.season = self.season;
        profile.episode = self.episode;
        profile.website = self.website;
        profile.proper = self.proper;
        profile.repack = self.repack;
        profile.edition = self.edition;
        profile.language = self.language;
        profile.hybrid = self.hybrid;
        profile
    }
}

impl From<&DuplicateReleaseProfile> for DuplicateProfileRequest {
    fn from(p: &DuplicateReleaseProfile) -> Self {
        Self {
            name: p.name.clone(),
            protocol: p.protocol,
            release_name: p.release_name,
            hash: p.hash,
            title: p.title,
            sub_title: p.sub_title,
            year: p.year,
            month: p.month,
            day: p.day,
            source: p.source,
            resolution: p.resolution,
            codec: p.codec,
            container: p.container,
            hdr: p.dynamic_range,
            audio: p.audio,
            group: p.group,
            season: p.season,
            episode: p.episode,
            website: p.website,
            proper: p.proper,
            repack: p.repack,
            edition: p.edition,
            language: p.language,
            hybrid: p.hybrid,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DuplicateProfileResponse {
    pub id: String,
    #[serde(flatten)]
    pub fields: DuplicateProfileRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DuplicateReleaseProfile> for DuplicateProfileResponse {
    fn from(profile: DuplicateReleaseProfile) -> Self {
        Self {
            id: profile.id.to_string(),
            fields: DuplicateProfileRequest::from(&profile),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

fn parse_id(id: &str) -> Result<DuplicateProfileId, Response> {
    Uuid::parse_str(id)
        .map(DuplicateProfileId::from_uuid)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("invalid profile id: {id}")))
}

fn profile_error(err: ProfileError) -> Response {
    match err {
        ProfileError::Validation(errors) => validation_response(errors),
        ProfileError::NotFound(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        ProfileError::InUse { .. } | ProfileError::Conflict(_) => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        ProfileError::Storage(ref source) => {
            error!(target: "api", error = %source, "duplicate profile storage failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List duplicate profiles
#[utoipa::path(
    get,
    path = "/api/v1/release/profiles/duplicate",
    params(ListProfilesQuery),
    responses(
        (status = 200, description = "List of duplicate profiles", body = Vec<DuplicateProfileResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn list_profiles(
    State(state): State<AppState>,
    Query(query): Query<ListProfilesQuery>,
) -> Response {
    debug!(target: "api", ?query, "listing duplicate profiles");
    match state.profiles.list(query.limit, query.offset).await {
        Ok(profiles) => Json(
            profiles
                .into_iter()
                .map(DuplicateProfileResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => profile_error(err),
    }
}

/// Get a duplicate profile by ID
#[utoipa::path(
    get,
    path = "/api/v1/release/profiles/duplicate/{id}",
    params(
        ("id" = String, Path, description = "Duplicate profile ID")
    ),
    responses(
        (status = 200, description = "Duplicate profile found", body = DuplicateProfileResponse),
        (status = 400, description = "Malformed ID", body = ErrorResponse),
        (status = 404, description = "Duplicate profile not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn get_profile(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    debug!(target: "api", %id, "fetching duplicate profile");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.profiles.get(id).await {
        Ok(profile) => Json(DuplicateProfileResponse::from(profile)).into_response(),
        Err(err) => profile_error(err),
    }
}

/// Create a duplicate profile
#[utoipa::path(
    post,
    path = "/api/v1/release/profiles/duplicate",
    request_body = DuplicateProfileRequest,
    responses(
        (status = 201, description = "Duplicate profile created", body = DuplicateProfileResponse),
        (status = 400, description = "Invalid profile", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn create_profile(
    State(state): State<AppState>,
    Json(request): Json<DuplicateProfileRequest>,
) -> Response {
    debug!(target: "api", name = %request.name, "creating duplicate profile");
    match state.profiles.create(request.into_profile()).await {
        Ok(profile) => (
            StatusCode::CREATED,
            Json(DuplicateProfileResponse::from(profile)),
        )
            .into_response(),
        Err(err) => profile_error(err),
    }
}

/// Replace a duplicate profile
#[utoipa::path(
    put,
    path = "/api/v1/release/profiles/duplicate/{id}",
    params(
        ("id" = String, Path, description = "Duplicate profile ID")
    ),
    request_body = DuplicateProfileRequest,
    responses(
        (status = 200, description = "Duplicate profile updated", body = DuplicateProfileResponse),
        (status = 400, description = "Invalid profile", body = ErrorResponse),
        (status = 404, description = "Duplicate profile not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DuplicateProfileRequest>,
) -> Response {
    debug!(target: "api", %id, "updating duplicate profile");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.profiles.update(id, request.into_profile()).await {
        Ok(profile) => Json(DuplicateProfileResponse::from(profile)).into_response(),
        Err(err) => profile_error(err),
    }
}

/// Delete a duplicate profile that no filter uses
#[utoipa::path(
    delete,
    path = "/api/v1/release/profiles/duplicate/{id}",
    params(
        ("id" = String, Path, description = "Duplicate profile ID")
    ),
    responses(
        (status = 204, description = "Duplicate profile deleted"),
        (status = 404, description = "Duplicate profile not found", body = ErrorResponse),
        (status = 409, description = "Duplicate profile in use by filters", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn delete_profile(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    debug!(target: "api", %id, "deleting duplicate profile");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.profiles.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => profile_error(err),
    }
}
