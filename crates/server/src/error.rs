//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers should return
//! `Result<T, AppError>`. Responses are JSON with a stable machine-readable
//! `error` code and a human-readable `message`; distinct codes for the
//! verification failures let the UI offer "resend" only when appropriate.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::EngineError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Domain service failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Database operation failed outside a service.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// The verification endpoint was called without a token.
    #[error("Missing token")]
    MissingToken,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for the response body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Engine(e) => match e {
                EngineError::Validation(_) => "validation_error",
                EngineError::Conflict(_) => "conflict",
                EngineError::Constraint(_) => "constraint_violation",
                EngineError::NotFound(_) => "not_found",
                EngineError::TokenInvalid => "invalid_token",
                EngineError::TokenExpired => "expired_token",
                EngineError::TokenAlreadyUsed => "already_used",
                EngineError::RateLimited => "rate_limited",
                EngineError::State(_) => "state_error",
                EngineError::Repository(_) => "internal_error",
            },
            Self::MissingToken => "missing_token",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Engine(e) => match e {
                EngineError::Validation(_)
                | EngineError::TokenExpired
                | EngineError::TokenAlreadyUsed => StatusCode::BAD_REQUEST,
                EngineError::Conflict(_) | EngineError::Constraint(_) | EngineError::State(_) => {
                    StatusCode::CONFLICT
                }
                EngineError::NotFound(_) | EngineError::TokenInvalid => StatusCode::NOT_FOUND,
                EngineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                EngineError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::MissingToken | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error should be captured to Sentry.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Engine(EngineError::Repository(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let code = self.code();

        // Don't expose internal error details to clients
        let message = if status.is_server_error() {
            "Internal server error".to_owned()
        } else if matches!(self, Self::Engine(EngineError::RateLimited)) {
            "Too many verification requests, please try again later".to_owned()
        } else {
            self.to_string()
        };

        let body = Json(serde_json::json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            status_of(EngineError::Validation("bad".to_owned()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(EngineError::Conflict("dup".to_owned()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(EngineError::Constraint("primary".to_owned()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(EngineError::NotFound("gone".to_owned()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(EngineError::RateLimited.into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(EngineError::State("illegal".to_owned()).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_token_failures_have_distinct_codes() {
        let invalid: AppError = EngineError::TokenInvalid.into();
        let expired: AppError = EngineError::TokenExpired.into();
        let used: AppError = EngineError::TokenAlreadyUsed.into();

        assert_eq!(invalid.code(), "invalid_token");
        assert_eq!(expired.code(), "expired_token");
        assert_eq!(used.code(), "already_used");
        assert_eq!(AppError::MissingToken.code(), "missing_token");

        assert_eq!(invalid.status(), StatusCode::NOT_FOUND);
        assert_eq!(expired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(used.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let err = AppError::Internal("connection pool exhausted".to_owned());
        assert_eq!(err.code(), "internal_error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
