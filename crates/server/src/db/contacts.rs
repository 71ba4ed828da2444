//! Contact repository for database operations.
//!
//! Uniqueness of the normalized (kind, value) pair and the one-primary-per-
//! owner rule are enforced by database constraints; this module maps those
//! violations onto typed errors.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use listkeeper_core::{AccountId, ContactAddress, ContactId, ContactKind};

use super::RepositoryError;
use crate::models::Contact;

/// Columns selected for every contact query, in `ContactRow` order.
pub(crate) const CONTACT_COLUMNS: &str =
    "id, kind, value, owner_account_id, is_primary, is_verified, \
     verified_at, source, metadata, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` contact queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ContactRow {
    id: i32,
    kind: String,
    value: String,
    owner_account_id: Option<Uuid>,
    is_primary: bool,
    is_verified: bool,
    verified_at: Option<DateTime<Utc>>,
    source: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for Contact {
    type Error = RepositoryError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let kind: ContactKind = row.kind.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid contact kind in database: {e}"))
        })?;
        let address = ContactAddress::parse(kind, &row.value).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid contact value in database: {e}"))
        })?;

        Ok(Self {
            id: ContactId::new(row.id),
            address,
            owner_account_id: row.owner_account_id.map(AccountId::new),
            is_primary: row.is_primary,
            is_verified: row.is_verified,
            verified_at: row.verified_at,
            source: row.source,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fields for inserting a new contact.
#[derive(Debug, Clone)]
pub struct NewContact<'a> {
    /// Normalized address.
    pub address: &'a ContactAddress,
    /// Provenance tag.
    pub source: &'a str,
    /// Owning account, if already known.
    pub owner_account_id: Option<AccountId>,
    /// Whether this is the owner's primary contact of its kind.
    pub is_primary: bool,
    /// Whether the address is already verified (trusted channel).
    pub is_verified: bool,
}

/// Map a unique-violation error onto the constraint that fired.
fn map_insert_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        if db_err.constraint() == Some("contact_primary_per_owner_key") {
            return RepositoryError::Constraint(
                "owner already has a primary contact of this kind".to_owned(),
            );
        }
        return RepositoryError::Conflict("contact already exists".to_owned());
    }
    RepositoryError::Database(e)
}

/// Repository for contact database operations.
pub struct ContactRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContactRepository<'a> {
    /// Create a new contact repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a contact by its normalized address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored value is invalid.
    pub async fn get_by_address(
        &self,
        address: &ContactAddress,
    ) -> Result<Option<Contact>, RepositoryError> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM listkeeper.contact WHERE kind = $1 AND value = $2"
        ))
        .bind(address.kind().as_str())
        .bind(address.value())
        .fetch_optional(self.pool)
        .await?;

        row.map(Contact::try_from).transpose()
    }

    /// Get a contact by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored value is invalid.
    pub async fn get_by_id(&self, id: ContactId) -> Result<Option<Contact>, RepositoryError> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM listkeeper.contact WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Contact::try_from).transpose()
    }

    /// Create a new contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the (kind, value) pair exists.
    /// Returns `RepositoryError::Constraint` if it would create a second
    /// primary contact for the same owner and kind.
    pub async fn create(&self, new: NewContact<'_>) -> Result<Contact, RepositoryError> {
        let verified_at = new.is_verified.then(Utc::now);

        let row: ContactRow = sqlx::query_as(&format!(
            "INSERT INTO listkeeper.contact \
                 (kind, value, owner_account_id, is_primary, is_verified, verified_at, source) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(new.address.kind().as_str())
        .bind(new.address.value())
        .bind(new.owner_account_id)
        .bind(new.is_primary)
        .bind(new.is_verified)
        .bind(verified_at)
        .bind(new.source)
        .fetch_one(self.pool)
        .await
        .map_err(map_insert_error)?;

        row.try_into()
    }

    /// Promote a contact's ownership and verification.
    ///
    /// Ownership and verification are only ever raised: an existing owner is
    /// kept, a verified flag is never cleared, and `verified_at` is stamped
    /// exactly once. The source tag is refreshed to the latest caller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact doesn't exist.
    /// Returns `RepositoryError::Constraint` if promoting `is_primary` would
    /// create a second primary for the owner and kind.
    pub async fn promote(
        &self,
        id: ContactId,
        owner_account_id: AccountId,
        is_primary: bool,
        is_verified: bool,
        source: &str,
    ) -> Result<Contact, RepositoryError> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "UPDATE listkeeper.contact SET \
                 owner_account_id = COALESCE(owner_account_id, $2), \
                 is_primary = is_primary OR $3, \
                 verified_at = CASE WHEN $4 AND NOT is_verified THEN now() ELSE verified_at END, \
                 is_verified = is_verified OR $4, \
                 source = $5, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(owner_account_id.as_uuid())
        .bind(is_primary)
        .bind(is_verified)
        .bind(source)
        .fetch_optional(self.pool)
        .await
        .map_err(map_insert_error)?;

        row.map_or(Err(RepositoryError::NotFound), ContactRow::try_into)
    }

    /// Get all contacts owned by an account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_owner(
        &self,
        owner_account_id: AccountId,
    ) -> Result<Vec<Contact>, RepositoryError> {
        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM listkeeper.contact \
             WHERE owner_account_id = $1 ORDER BY created_at ASC"
        ))
        .bind(owner_account_id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Contact::try_from).collect()
    }

    /// Delete every contact owned by an account.
    ///
    /// Subscriptions and verification tokens referencing the contacts are
    /// removed by the `ON DELETE CASCADE` constraints.
    ///
    /// # Returns
    ///
    /// The number of contacts deleted (0 when the account owns none).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_owner(
        &self,
        owner_account_id: AccountId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM listkeeper.contact WHERE owner_account_id = $1")
            .bind(owner_account_id.as_uuid())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
