use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::types::{ApiErrorCode, ApiErrorResponse};

/// Failures of the subscription and delivery-log stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),
}

/// Failures that abort a whole dispatch call.
///
/// Individual delivery failures never surface here; they are reported per
/// subscription in the dispatch results.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to resolve subscriptions: {0}")]
    Resolution(#[source] StoreError),
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Db(sqlx::Error),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Db(db) => ApiError::Db(db),
            StoreError::NotFound(message) => ApiError::NotFound(message),
            StoreError::Parse(message) => ApiError::Internal(message),
            StoreError::Validation(message) => ApiError::BadRequest(message),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Resolution(store) => store.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, ApiErrorCode::Validation, message)
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, ApiErrorCode::Unauthorized, message)
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, ApiErrorCode::NotFound, message),
            ApiError::Db(err) => {
                tracing::error!(error = %err, "database error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorCode::Database,
                    "database error".to_string(),
                )
            }
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorCode::Internal,
                message,
            ),
        };

        (status, Json(ApiErrorResponse { code, message })).into_response()
    }
}
