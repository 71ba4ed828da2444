//! Domain services for the subscription engine.
//!
//! Each service wraps the repositories with the actual business rules:
//!
//! - [`contacts`] - contact creation, account linking, default-list side effects
//! - [`subscriptions`] - the subscription state machine
//! - [`verification`] - token issuance (rate-limited) and consumption
//! - [`suppression`] - delivery-provider feedback processing
//! - [`data_rights`] - export and erasure of a contact's subscription data
//! - [`mailer`] - delivery-provider client used to send verification mail

pub mod contacts;
pub mod data_rights;
pub mod mailer;
pub mod subscriptions;
pub mod suppression;
pub mod verification;

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors surfaced by the domain services.
///
/// Every variant carries a stable meaning for the HTTP layer: validation and
/// state errors are surfaced to the caller with a machine-readable code,
/// repository failures become opaque 500s.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input (bad address, bad slug, bad request shape).
    #[error("{0}")]
    Validation(String),

    /// A row that must be unique already exists.
    #[error("{0}")]
    Conflict(String),

    /// A non-uniqueness constraint would be violated.
    #[error("{0}")]
    Constraint(String),

    /// The referenced contact, list, or subscription doesn't exist.
    #[error("{0}")]
    NotFound(String),

    /// No token with the presented value exists.
    #[error("Invalid token")]
    TokenInvalid,

    /// The token's validity window has passed.
    #[error("Token has expired")]
    TokenExpired,

    /// The token was already consumed.
    #[error("Token has already been used")]
    TokenAlreadyUsed,

    /// Too many verification requests in the rolling window.
    #[error("Too many verification requests")]
    RateLimited,

    /// The requested transition is illegal in the current state.
    #[error("illegal transition: {0}")]
    State(String),

    /// Underlying repository failure.
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for EngineError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::Constraint(msg) => Self::Constraint(msg),
            other => Self::Repository(other),
        }
    }
}
