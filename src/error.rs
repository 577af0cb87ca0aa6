use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Business-level error taxonomy shared by the services.
///
/// `Validation`, `InsufficientFunds`, `NotFound` and `Forbidden` are expected
/// rejections: the attempt performed no mutation and the caller must resubmit
/// with corrected state. `AlreadyProcessed` is an idempotency short-circuit,
/// not a failure. `Transient` covers storage/lock failures inside an atomic
/// unit; rollback is guaranteed, so the caller may retry.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds in account")]
    InsufficientFunds,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    AlreadyProcessed(String),

    #[error("storage failure")]
    Transient(#[source] StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => LedgerError::NotFound(what.to_string()),
            other => LedgerError::Transient(other),
        }
    }
}

/// HTTP boundary error. Every handler returns `Result<_, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds in account")]
    InsufficientFunds,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    AlreadyProcessed(String),

    #[error("Service temporarily unavailable, please retry")]
    Transient,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => AppError::Validation(msg),
            LedgerError::InvalidAmount(msg) => AppError::Validation(msg),
            LedgerError::InsufficientFunds => AppError::InsufficientFunds,
            LedgerError::NotFound(what) => AppError::NotFound(what),
            LedgerError::Forbidden(msg) => AppError::Forbidden(msg),
            LedgerError::AlreadyProcessed(msg) => AppError::AlreadyProcessed(msg),
            LedgerError::Transient(source) => {
                // Storage internals stay out of the response body.
                tracing::error!(error = %source, "storage failure during request");
                AppError::Transient
            }
        }
    }
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientFunds => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            // Idempotency short-circuit is reported as success.
            AppError::AlreadyProcessed(_) => StatusCode::OK,
            AppError::Transient => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let AppError::AlreadyProcessed(detail) = &self {
            let body = Json(json!({ "detail": detail }));
            return (status, body).into_response();
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_status_code() {
        let error = AppError::Validation("bad input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn insufficient_funds_status_code() {
        assert_eq!(
            AppError::InsufficientFunds.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_found_status_code() {
        let error = AppError::NotFound("order 7".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn forbidden_status_code() {
        let error = AppError::Forbidden("not your order".to_string());
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn already_processed_reports_success() {
        let error = AppError::AlreadyProcessed("order already paid".to_string());
        assert_eq!(error.status_code(), StatusCode::OK);
    }

    #[test]
    fn transient_status_code() {
        assert_eq!(
            AppError::Transient.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_not_found_maps_to_ledger_not_found() {
        let err = LedgerError::from(StoreError::NotFound("account"));
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn store_lock_timeout_maps_to_transient() {
        let err = LedgerError::from(StoreError::LockTimeout);
        let app = AppError::from(err);
        assert!(matches!(app, AppError::Transient));
    }

    #[tokio::test]
    async fn transient_response_hides_internals() {
        let response = AppError::Transient.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn already_processed_response_is_ok() {
        let error = AppError::AlreadyProcessed("Order already paid".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
