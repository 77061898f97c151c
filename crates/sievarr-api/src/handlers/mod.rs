// SPDX-License-Identifier: GPL-3.0-or-later
pub mod filters;
pub mod indexers;
pub mod profiles;
pub mod releases;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sievarr_domain::ValidationError;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldErrorResponse {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldErrorResponse>,
}

pub(crate) fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            fields: Vec::new(),
        }),
    )
        .into_response()
}

pub(crate) fn validation_response(errors: Vec<ValidationError>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "validation failed".to_string(),
            fields: errors
                .into_iter()
                .map(|e| FieldErrorResponse {
                    field: e.field.to_string(),
                    message: e.message,
                })
                .collect(),
        }),
    )
        .into_response()
}
