use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::cloud::ErrorBody;
use crate::store::StoreError;

/// Handler error, rendered as an [`ErrorBody`].
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(&'static str),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new(ErrorBody::NOT_FOUND, msg)),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(ErrorBody::BAD_REQUEST, msg),
            ),
            Self::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new(ErrorBody::UNAUTHORIZED, msg),
            ),
            Self::Store(StoreError::DuplicateEmail(email)) => (
                StatusCode::CONFLICT,
                ErrorBody::new(ErrorBody::DUPLICATE_EMAIL, email),
            ),
            Self::Store(StoreError::Conflict(id)) => {
                (StatusCode::CONFLICT, ErrorBody::new(ErrorBody::CONFLICT, id))
            }
            Self::Store(StoreError::InvalidOwner(owner)) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(ErrorBody::INVALID_OWNER, owner),
            ),
            Self::Store(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(ErrorBody::INTERNAL, "Internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
