//! Error types for the campus library server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    NoSuchEntity = 5,
    BadValue = 6,
    Duplicate = 7,
    NotAvailable = 8,
    DuplicateActive = 9,
    CapacityExceeded = 10,
    EventFull = 11,
    RoomUnavailable = 12,
    UserAlreadyBooked = 13,
    SlotConflict = 14,
    AlreadyRegistered = 15,
    NotRegistered = 16,
    EventNotOpen = 17,
    NotActive = 18,
    NotInvited = 19,
    InvalidGuestRole = 20,
    NotEmpty = 21,
    InvalidStateTransition = 22,
}

/// Coarse failure classes shared by all operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    CapacityExceeded,
    NotAvailable,
    DuplicateActive,
    SlotConflict,
    NotAuthorized,
    InvalidStateTransition,
    Conflict,
    Authentication,
    Internal,
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

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("Duplicate active record: {0}")]
    DuplicateActive(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Event is full")]
    EventFull,

    #[error("Study room is not available for booking")]
    RoomUnavailable,

    #[error("User already holds an active study room reservation")]
    UserAlreadyBooked,

    #[error("Time slot is already booked")]
    SlotConflict,

    #[error("User is already registered for this event")]
    AlreadyRegistered,

    #[error("User is not registered for this event")]
    NotRegistered,

    #[error("Event is not open for registration changes")]
    EventNotOpen,

    #[error("Not active: {0}")]
    NotActive(String),

    #[error("Only the invited guest may respond to this invitation")]
    NotInvited,

    #[error("User is not an available guest: {0}")]
    InvalidGuestRole(String),

    #[error("Not empty: {0}")]
    NotEmpty(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Authentication(_) => ErrorKind::Authentication,
            AppError::NotAuthorized(_) | AppError::NotInvited => ErrorKind::NotAuthorized,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) | AppError::InvalidGuestRole(_) => ErrorKind::ValidationFailed,
            AppError::Conflict(_) | AppError::NotEmpty(_) => ErrorKind::Conflict,
            AppError::NotAvailable(_) | AppError::RoomUnavailable => ErrorKind::NotAvailable,
            AppError::DuplicateActive(_)
            | AppError::UserAlreadyBooked
            | AppError::AlreadyRegistered => ErrorKind::DuplicateActive,
            AppError::CapacityExceeded(_) | AppError::EventFull => ErrorKind::CapacityExceeded,
            AppError::SlotConflict => ErrorKind::SlotConflict,
            AppError::NotRegistered
            | AppError::EventNotOpen
            | AppError::NotActive(_)
            | AppError::InvalidStateTransition(_) => ErrorKind::InvalidStateTransition,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) => ErrorCode::NotAuthenticated,
            AppError::NotAuthorized(_) => ErrorCode::NotAuthorized,
            AppError::NotFound(_) => ErrorCode::NoSuchEntity,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::NotAvailable(_) => ErrorCode::NotAvailable,
            AppError::DuplicateActive(_) => ErrorCode::DuplicateActive,
            AppError::CapacityExceeded(_) => ErrorCode::CapacityExceeded,
            AppError::EventFull => ErrorCode::EventFull,
            AppError::RoomUnavailable => ErrorCode::RoomUnavailable,
            AppError::UserAlreadyBooked => ErrorCode::UserAlreadyBooked,
            AppError::SlotConflict => ErrorCode::SlotConflict,
            AppError::AlreadyRegistered => ErrorCode::AlreadyRegistered,
            AppError::NotRegistered => ErrorCode::NotRegistered,
            AppError::EventNotOpen => ErrorCode::EventNotOpen,
            AppError::NotActive(_) => ErrorCode::NotActive,
            AppError::NotInvited => ErrorCode::NotInvited,
            AppError::InvalidGuestRole(_) => ErrorCode::InvalidGuestRole,
            AppError::NotEmpty(_) => ErrorCode::NotEmpty,
            AppError::InvalidStateTransition(_) => ErrorCode::InvalidStateTransition,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let code = self.code();

        let status = match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
            ErrorKind::Conflict
            | ErrorKind::DuplicateActive
            | ErrorKind::SlotConflict
            | ErrorKind::InvalidStateTransition => StatusCode::CONFLICT,
            ErrorKind::CapacityExceeded | ErrorKind::NotAvailable => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

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
            | AppError::NotAvailable(msg)
            | AppError::DuplicateActive(msg)
            | AppError::CapacityExceeded(msg)
            | AppError::NotActive(msg)
            | AppError::InvalidGuestRole(msg)
            | AppError::NotEmpty(msg)
            | AppError::InvalidStateTransition(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            kind,
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
    fn test_specific_failures_map_to_taxonomy() {
        assert_eq!(AppError::EventFull.kind(), ErrorKind::CapacityExceeded);
        assert_eq!(AppError::RoomUnavailable.kind(), ErrorKind::NotAvailable);
        assert_eq!(AppError::UserAlreadyBooked.kind(), ErrorKind::DuplicateActive);
        assert_eq!(AppError::NotInvited.kind(), ErrorKind::NotAuthorized);
        assert_eq!(
            AppError::NotActive("loan".into()).kind(),
            ErrorKind::InvalidStateTransition
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::SlotConflict.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotAvailable("no copies".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::NotFound("book".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
