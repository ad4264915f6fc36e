//! Error types for Rentdesk server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchData = 4,
    NoSuchResource = 5,
    BadValue = 6,
    InsufficientStock = 7,
    InvalidCoupon = 8,
    OutsideBusinessHours = 9,
    ExceedsClosingTime = 10,
    TooEarly = 11,
    InvalidStateTransition = 12,
    PaymentRequired = 13,
    PaymentFailed = 14,
    ConcurrencyConflict = 15,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient stock for resource {resource_id}: requested {requested}, available {available}")]
    InsufficientStock {
        resource_id: i32,
        requested: i32,
        available: i32,
    },

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("Outside business hours: {0}")]
    OutsideBusinessHours(String),

    #[error("Exceeds closing time: {0}")]
    ExceedsClosingTime(String),

    #[error("Too early: {0}")]
    TooEarly(String),

    #[error("Invalid state transition: cannot {operation} from {from}")]
    InvalidStateTransition { operation: String, from: String },

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the operation may succeed if attempted again unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }

    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::ResourceNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchResource),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::InsufficientStock { .. } => (StatusCode::CONFLICT, ErrorCode::InsufficientStock),
            AppError::InvalidCoupon(_) => (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InvalidCoupon),
            AppError::OutsideBusinessHours(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::OutsideBusinessHours)
            }
            AppError::ExceedsClosingTime(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ExceedsClosingTime)
            }
            AppError::TooEarly(_) => (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::TooEarly),
            AppError::InvalidStateTransition { .. } => {
                (StatusCode::CONFLICT, ErrorCode::InvalidStateTransition)
            }
            AppError::PaymentRequired(_) => (StatusCode::PAYMENT_REQUIRED, ErrorCode::PaymentRequired),
            AppError::PaymentFailed(_) => (StatusCode::BAD_GATEWAY, ErrorCode::PaymentFailed),
            AppError::ConcurrencyConflict(_) => (StatusCode::CONFLICT, ErrorCode::ConcurrencyConflict),
            AppError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
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
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Persistence(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
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
