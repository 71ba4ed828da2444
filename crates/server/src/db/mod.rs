//! Database operations for the subscription engine (`PostgreSQL`).
//!
//! # Schema: `listkeeper`
//!
//! The database is the single source of truth; no component caches
//! subscription state across requests.
//!
//! ## Tables
//!
//! - `contact` - One row per normalized (kind, value) address
//! - `mailing_list` - Named audiences, unique by slug
//! - `contact_subscription` - Per-(contact, list) status row
//! - `verification_token` - Single-use double opt-in tokens
//!
//! Cascade deletes are wired in DDL: erasing a contact removes its
//! subscriptions and tokens without application logic.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p listkeeper-cli -- migrate
//! ```

pub mod contacts;
pub mod mailing_lists;
pub mod subscriptions;
pub mod tokens;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use contacts::ContactRepository;
pub use mailing_lists::MailingListRepository;
pub use subscriptions::SubscriptionRepository;
pub use tokens::TokenRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Uniqueness violation (e.g., duplicate contact address).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Non-uniqueness constraint violation (e.g., second primary contact).
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
