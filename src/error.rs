//! Error types for the circulation engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchData = 4,
    MediaNotAvailable = 7,
    BadValue = 18,
    OutstandingBalance = 22,
    HasOverdueItems = 23,
    UnpaidFine = 24,
    AlreadyPaid = 25,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Media {0} is not available")]
    MediaUnavailable(i32),

    #[error("User has an outstanding balance of {0}")]
    OutstandingBalance(Decimal),

    #[error("User has {0} overdue item(s)")]
    HasOverdueItems(i64),

    #[error("Borrowing {0} has an unpaid fine")]
    UnpaidFine(i32),

    #[error("Fine {0} is already paid")]
    AlreadyPaid(i32),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the underlying store rejected a read or write
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, AppError::Storage(_) | AppError::Database(_))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone()),
            AppError::MediaUnavailable(_) => {
                (StatusCode::CONFLICT, ErrorCode::MediaNotAvailable, self.to_string())
            }
            AppError::OutstandingBalance(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::OutstandingBalance,
                self.to_string(),
            ),
            AppError::HasOverdueItems(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::HasOverdueItems,
                self.to_string(),
            ),
            AppError::UnpaidFine(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::UnpaidFine, self.to_string())
            }
            AppError::AlreadyPaid(_) => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyPaid, self.to_string())
            }
            AppError::NotAuthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Storage failure".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_failure_kinds() {
        assert!(AppError::Storage("disk full".into()).is_storage_failure());
        assert!(AppError::Database(sqlx::Error::RowNotFound).is_storage_failure());
        assert!(!AppError::MediaUnavailable(3).is_storage_failure());
    }

    #[test]
    fn test_domain_error_status() {
        let response = AppError::MediaUnavailable(1).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::UnpaidFine(1).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = AppError::NotAuthenticated("no token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
