// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use sievarr_application::AppState;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::handlers::error_response;

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(api_key) = headers.get("X-Api-Key").and_then(|v| v.to_str().ok()) {
        return Some(api_key);
    }
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Checks `X-Api-Key` (or a bearer token) against `auth.api_key`.
/// Without a configured key every request passes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.auth.api_key.as_deref() else {
        return next.run(request).await;
    };

    match presented_key(&headers) {
        Some(key) if bool::from(key.as_bytes().ct_eq(expected.as_bytes())) => {
            debug!(target: "auth", path = %request.uri().path(), "api key accepted");
            next.run(request).await
        }
        Some(_) => {
            warn!(target: "auth", path = %request.uri().path(), "invalid api key");
            error_response(StatusCode::UNAUTHORIZED, "invalid api key")
        }
        None => {
            debug!(target: "auth", path = %request.uri().path(), "missing api key");
            error_response(StatusCode::UNAUTHORIZED, "missing api key")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn api_key_header_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer token"));
        assert_eq!(presented_key(&headers), Some("token"));

        headers.insert("X-Api-Key", HeaderValue::from_static("key"));
        assert_eq!(presented_key(&headers), Some("key"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(presented_key(&headers), None);
    }
}
