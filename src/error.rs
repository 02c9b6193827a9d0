//! Unified service error type
//!
//! Business-rule errors are identity-preserving so every layer can match on
//! the exact kind; infrastructure failures (`Database`, `Accrual`,
//! `Internal`) are logged where they surface to HTTP and reported to the
//! caller as a generic 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid order number")]
    InvalidOrderNumber,

    #[error("withdrawal amount must be positive")]
    InvalidAmount,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("login already taken")]
    UserAlreadyExists,

    #[error("order already submitted by this user")]
    OrderAlreadyAccepted,

    #[error("order submitted by another user")]
    OrderOwnedByAnother,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("accrual service: {0}")]
    Accrual(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) | Error::InvalidAmount => StatusCode::BAD_REQUEST,
            Error::InvalidOrderNumber => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::UserAlreadyExists | Error::OrderOwnedByAnother => StatusCode::CONFLICT,
            // Idempotent re-submission by the same user is reported as OK.
            Error::OrderAlreadyAccepted => StatusCode::OK,
            Error::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Database(_) | Error::Accrual(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.http_status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
            let body = Json(serde_json::json!({ "error": "internal server error" }));
            return (status, body).into_response();
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_contract_statuses() {
        assert_eq!(
            Error::InvalidInput("empty".into()).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::InvalidOrderNumber.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::InvalidCredentials.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::UserAlreadyExists.http_status(), StatusCode::CONFLICT);
        assert_eq!(Error::OrderAlreadyAccepted.http_status(), StatusCode::OK);
        assert_eq!(
            Error::OrderOwnedByAnother.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::InsufficientFunds.http_status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(Error::NotFound.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn infrastructure_errors_are_opaque_500s() {
        assert_eq!(
            Error::Accrual("boom".into()).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Internal("boom".into()).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
