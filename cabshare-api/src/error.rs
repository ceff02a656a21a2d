use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use cabshare_booking::BookingError;
use cabshare_core::payment::IntentError;
use cabshare_ledger::{LedgerError, SettlementError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match &err {
            BookingError::RideNotFound | BookingError::BookingNotFound => {
                AppError::NotFoundError(err.to_string())
            }
            BookingError::NotRideDriver | BookingError::NotBookingParty => {
                AppError::AuthorizationError(err.to_string())
            }
            BookingError::RideNotPublished
            | BookingError::SelfBookingForbidden
            | BookingError::InvalidSeatCount
            | BookingError::InsufficientFunds { .. } => AppError::ValidationError(err.to_string()),
            BookingError::InsufficientSeats { .. } | BookingError::InvalidTransition { .. } => {
                AppError::ConflictError(err.to_string())
            }
            BookingError::CompensationFailure(_) | BookingError::Storage(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::InsufficientFunds { .. }
            | LedgerError::InsufficientReserved { .. }
            | LedgerError::InvalidAmount => AppError::ValidationError(err.to_string()),
            LedgerError::Storage(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match &err {
            SettlementError::Storage(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<IntentError> for AppError {
    fn from(err: IntentError) -> Self {
        match &err {
            IntentError::NotFound => AppError::NotFoundError(err.to_string()),
            IntentError::AlreadyProcessed => AppError::ConflictError(err.to_string()),
            IntentError::VerificationFailed | IntentError::InvalidAmount => {
                AppError::ValidationError(err.to_string())
            }
            IntentError::Storage(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}
