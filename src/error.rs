//! Error kinds surfaced by the financial core.
//!
//! The core returns these verbatim; the HTTP edge maps them to status codes
//! through the `ResponseError` impl below.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Referenced entity absent.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not the entity's principal.
    #[error("{0}")]
    Forbidden(String),

    /// A lifecycle precondition failed (already signed, already paid, not pending, ...).
    #[error("{0}")]
    IllegalState(String),

    /// Concurrent conflict: insufficient stock, busy worker, duplicate row.
    #[error("{0}")]
    Conflict(String),

    /// Schema or range violation.
    #[error("{0}")]
    InvalidInput(String),

    /// Bad webhook signature or missing/invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Gateway or store temporarily failed; retry is safe.
    #[error("{0}")]
    Unavailable(String),

    /// A post-condition was found broken. Nothing was transitioned.
    #[error("{0}")]
    IntegrityViolation(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound(format!("{what} {id} not found"))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::IllegalState(_) => "ILLEGAL_STATE",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Unavailable(_) => "UNAVAILABLE",
            CoreError::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
        }
    }

    fn is_server_side(&self) -> bool {
        matches!(
            self,
            CoreError::Unavailable(_) | CoreError::IntegrityViolation(_)
        )
    }
}

impl From<DbErr> for CoreError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return CoreError::Conflict(format!("duplicate record: {detail}"));
        }
        match err {
            DbErr::RecordNotFound(what) => CoreError::NotFound(what),
            other => CoreError::Unavailable(format!("database error: {other}")),
        }
    }
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        CoreError::Unavailable(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetails<'a>,
}

#[derive(Serialize)]
struct ErrorDetails<'a> {
    code: &'a str,
    message: String,
}

impl ResponseError for CoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::IllegalState(_) | CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::IntegrityViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.error_code();
        let message = self.to_string();

        if self.is_server_side() {
            tracing::error!(error = %message, code = %code, "Server error occurred");
        } else {
            tracing::debug!(error = %message, code = %code, "Client error occurred");
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: ErrorDetails { code, message },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CoreError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CoreError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            CoreError::IllegalState("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CoreError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CoreError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CoreError::Unavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            CoreError::IntegrityViolation("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let err: CoreError = DbErr::RecordNotFound("Invoice missing".into()).into();
        assert!(matches!(err, CoreError::NotFound(ref m) if m == "Invoice missing"));
    }

    #[test]
    fn test_other_db_errors_are_retryable() {
        let err: CoreError = DbErr::Custom("connection reset".into()).into();
        assert_eq!(err.error_code(), "UNAVAILABLE");
    }

    #[test]
    fn test_gateway_timeout_is_unavailable() {
        let err: CoreError = GatewayError::Timeout.into();
        assert!(matches!(err, CoreError::Unavailable(_)));
    }
}
