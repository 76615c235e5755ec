use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use crate::credentials::constant_time_eq;
use super::routes::AppState;

/// Bearer-key check. With no key configured every request passes.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key,
            None => {
                return ApiError::Unauthorized("Authorization header must use Bearer scheme")
                    .into_response()
            }
        },
        None => return ApiError::Unauthorized("Authorization header required").into_response(),
    };

    if constant_time_eq(api_key.as_bytes(), expected.as_bytes()) {
        next.run(request).await
    } else {
        tracing::warn!("Rejected request with invalid API key");
        ApiError::Unauthorized("Invalid API key").into_response()
    }
}
