use axum::{extract::rejection::JsonRejection, http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use tracing::error;

use crate::domain::aggregates::OrderError;
use crate::publisher::DeliveryError;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid request")]
    Validation(#[from] validator::ValidationErrors),
    #[error("audit event was not delivered: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Maps a repository failure, naming the missing entity for 404s.
    pub fn from_repository(err: RepositoryError, missing: &'static str) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound(missing),
            RepositoryError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self { Self::BadRequest(err.to_string()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(what) => (StatusCode::NOT_FOUND, what).into_response(),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            Self::Delivery(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
            Self::Internal(msg) => {
                error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
