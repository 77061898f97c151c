// SPDX-License-Identifier: GPL-3.0-or-later
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use handlers::filters::{
    connect_indexer, create_filter, delete_filter, disconnect_indexer, get_filter, list_filters,
    update_filter, FilterIndexerRequest, FilterRequest, FilterResponse, __path_connect_indexer,
    __path_create_filter, __path_delete_filter, __path_disconnect_indexer, __path_get_filter,
    __path_list_filters, __path_update_filter,
};
use handlers::indexers::{
    create_indexer, delete_indexer, get_indexer, list_indexers, update_indexer, IndexerRequest,
    IndexerResponse, __path_create_indexer, __path_delete_indexer, __path_get_indexer,
    __path_list_indexers, __path_update_indexer,
};
use handlers::profiles::{
    create_profile, delete_profile, get_profile, list_profiles, update_profile,
    DuplicateProfileRequest, DuplicateProfileResponse, __path_create_profile,
    __path_delete_profile, __path_get_profile, __path_list_profiles, __path_update_profile,
};
use handlers::releases::{
    delete_releases, evaluate_release, list_releases, process_release, DeleteReleasesResponse,
    EvaluateReleaseRequest, MatchResultResponse, ReleaseResponse, __path_delete_releases,
    __path_evaluate_release, __path_list_releases, __path_process_release,
};
use handlers::{ErrorResponse, FieldErrorResponse};
use middleware::auth::auth_middleware;
use serde::Serialize;
use sievarr_application::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Serialize, utoipa::ToSchema)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
#[allow(dead_code)]
async fn health() -> Json<HealthResponse> {
    health_handler().await
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_profiles,
        get_profile,
        create_profile,
        update_profile,
        delete_profile,
        list_filters,
        get_filter,
        create_filter,
        update_filter,
        delete_filter,
        connect_indexer,
        disconnect_indexer,
        list_indexers,
        get_indexer,
        create_indexer,
        update_indexer,
        delete_indexer,
        evaluate_release,
        process_release,
        list_releases,
        delete_releases,
    ),
    components(
        schemas(
            HealthResponse,
            DuplicateProfileRequest,
            DuplicateProfileResponse,
            FilterRequest,
            FilterResponse,
            FilterIndexerRequest,
            IndexerRequest,
            IndexerResponse,
            EvaluateReleaseRequest,
            MatchResultResponse,
            ReleaseResponse,
            DeleteReleasesResponse,
            ErrorResponse,
            FieldErrorResponse,
        )
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "profiles", description = "Duplicate release profile management"),
        (name = "filters", description = "Filter criteria and indexer bindings"),
        (name = "indexers", description = "Indexer registration"),
        (name = "releases", description = "Release evaluation and history")
    ),
    info(
        title = "Sievarr API",
        version = "0.1.0",
        description = "Release filtering and duplicate detection service",
    )
)]
struct ApiDoc;

pub fn router(state: AppState) -> Router {
    info!(target: "api", "building router");

    let api_v1 = Router::new()
        .route(
            "/release/profiles/duplicate",
            get(list_profiles).post(create_profile),
        )
        .route(
            "/release/profiles/duplicate/:id",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/filters", get(list_filters).post(create_filter))
        .route(
            "/filters/:id",
            get(get_filter).put(update_filter).delete(delete_filter),
        )
        .route(
            "/filters/:id/indexers/:indexer_id",
            put(connect_indexer).delete(disconnect_indexer),
        )
        .route("/indexers", get(list_indexers).post(create_indexer))
        .route(
            "/indexers/:id",
            get(get_indexer).put(update_indexer).delete(delete_indexer),
        )
        .route("/releases", get(list_releases).delete(delete_releases))
        .route("/releases/evaluate", post(evaluate_release))
        .route("/releases/process", post(process_release))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let openapi = ApiDoc::openapi();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api_v1)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", openapi))
        .layer(cors)
        .with_state(state)
}
