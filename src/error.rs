use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::engagement::EngagementError;
use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("authentication required")] Unauthenticated,
    #[error("forbidden")] Forbidden,
    #[error("not found")] NotFound,
    #[error("bad request: {0}")] BadRequest(String),
    #[error("conflict")] Conflict,
    #[error("too many requests")] TooManyRequests,
    #[error("service unavailable: {0}")] Unavailable(String),
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict => ApiError::Conflict,
            RepoError::Unsupported(m) | RepoError::Internal(m) => {
                log::error!("repository error: {m}");
                ApiError::Internal
            }
        }
    }
}

impl From<EngagementError> for ApiError {
    fn from(e: EngagementError) -> Self {
        match e {
            EngagementError::Unauthenticated => ApiError::Unauthenticated,
            EngagementError::NotFound => ApiError::NotFound,
            EngagementError::Transient(m) => {
                log::error!("engagement store error: {m}");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}
