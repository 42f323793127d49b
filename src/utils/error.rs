use crate::{
    database::StoreError,
    models::ApiResponse,
    services::{consistency::ConsistencyError, query::QueryError},
};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Errors surfaced by the HTTP handlers, rendered as the `{message, data}`
/// envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected input; nothing was written
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ConsistencyError> for ApiError {
    fn from(err: ConsistencyError) -> Self {
        match err {
            ConsistencyError::Store(e) => ApiError::Store(e),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Store(e) => {
                log::error!("❌ {}", e);
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ApiResponse::empty(message))
    }
}
