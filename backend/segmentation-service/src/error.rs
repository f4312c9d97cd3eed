use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::services::clustering::ClusteringError;

pub type Result<T> = std::result::Result<T, AppError>;

const MIN_DATA_HINT: &str = "clustering needs at least 2 users with logged activity \
     (views, searches, ratings, hovers or navigation); filter inactive users and retry";

const ADJUST_CONFIG_HINT: &str = "the clustering engine is deterministic, retrying the same \
     request will fail again; request fewer clusters or a different linkage/metric";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The user has no record in any log kind.
    #[error("No activity recorded for user {0}")]
    DataUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Clustering failed: {0}")]
    Computation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl AppError {
    fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::InsufficientData(_) | AppError::DataUnavailable(_) => Some(MIN_DATA_HINT),
            AppError::Computation(_) => Some(ADJUST_CONFIG_HINT),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientData(_)
            | AppError::DataUnavailable(_)
            | AppError::Computation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
            hint: self.hint(),
        })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("clustering task aborted: {}", err))
    }
}

impl From<ClusteringError> for AppError {
    fn from(err: ClusteringError) -> Self {
        match err {
            ClusteringError::InvalidConfig(msg) => AppError::Validation(msg),
            ClusteringError::InsufficientData(msg) => AppError::InsufficientData(msg),
            ClusteringError::Degenerate(msg) => AppError::Computation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InsufficientData("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Timeout("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_clustering_error_mapping() {
        let err: AppError = ClusteringError::InvalidConfig("too many clusters".into()).into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = ClusteringError::Degenerate("all distances zero".into()).into();
        assert!(matches!(err, AppError::Computation(_)));
        assert!(err.hint().is_some());
    }
}
