//! Error types for Biblio server

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
    BadValue = 5,
    Duplicate = 6,
    MaxLoansReached = 10,
    DuplicateActiveLoan = 11,
    NoSuchBook = 12,
    OutOfStock = 13,
    ReservedByOther = 14,
    NoSuchLoan = 15,
    AlreadyReturned = 16,
    BookAvailable = 17,
    NoSuchFine = 18,
    AlreadyPaid = 19,
    ConcurrencyConflict = 20,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("A member cannot hold more than {limit} active loans")]
    CapacityExceeded { limit: u32 },

    #[error("Member already has an active loan for this book")]
    DuplicateActiveLoan,

    #[error("Book with id {0} not found")]
    BookNotFound(i32),

    #[error("Book is out of stock and has no reservation")]
    OutOfStockNoReservation,

    #[error("Book is reserved by another member")]
    ReservedByOther,

    #[error("Loan with id {0} not found")]
    LoanNotFound(i32),

    #[error("Loan {0} has already been returned")]
    AlreadyReturned(i32),

    #[error("Book {0} is available and cannot be reserved")]
    BookAvailable(i32),

    #[error("Fine with id {0} not found")]
    FineNotFound(i32),

    #[error("Fine {0} has already been paid")]
    AlreadyPaid(i32),

    #[error("Record changed by someone else: {0}")]
    ConcurrencyConflict(String),
}

impl AppError {
    /// True for the business-rule rejections callers are expected to handle
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            AppError::CapacityExceeded { .. }
                | AppError::DuplicateActiveLoan
                | AppError::BookNotFound(_)
                | AppError::OutOfStockNoReservation
                | AppError::ReservedByOther
                | AppError::LoanNotFound(_)
                | AppError::AlreadyReturned(_)
                | AppError::BookAvailable(_)
                | AppError::FineNotFound(_)
                | AppError::AlreadyPaid(_)
                | AppError::ConcurrencyConflict(_)
                | AppError::NotAuthorized(_)
        )
    }

    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::NotAuthorized(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
            AppError::CapacityExceeded { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::MaxLoansReached)
            }
            AppError::DuplicateActiveLoan => {
                (StatusCode::CONFLICT, ErrorCode::DuplicateActiveLoan)
            }
            AppError::BookNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook),
            AppError::OutOfStockNoReservation => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::OutOfStock)
            }
            AppError::ReservedByOther => (StatusCode::CONFLICT, ErrorCode::ReservedByOther),
            AppError::LoanNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchLoan),
            AppError::AlreadyReturned(_) => (StatusCode::CONFLICT, ErrorCode::AlreadyReturned),
            AppError::BookAvailable(_) => (StatusCode::CONFLICT, ErrorCode::BookAvailable),
            AppError::FineNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchFine),
            AppError::AlreadyPaid(_) => (StatusCode::CONFLICT, ErrorCode::AlreadyPaid),
            AppError::ConcurrencyConflict(_) => {
                (StatusCode::CONFLICT, ErrorCode::ConcurrencyConflict)
            }
        }
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
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::NotAuthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg) => msg.clone(),
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

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
