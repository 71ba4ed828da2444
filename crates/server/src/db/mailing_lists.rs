//! Mailing list repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use listkeeper_core::MailingListId;

use super::RepositoryError;
use crate::models::MailingList;

/// Columns selected for every mailing list query, in `MailingListRow` order.
const LIST_COLUMNS: &str =
    "id, slug, name, description, is_default, is_active, created_at, updated_at";

/// Internal row type for `PostgreSQL` mailing list queries.
#[derive(Debug, sqlx::FromRow)]
struct MailingListRow {
    id: i32,
    slug: String,
    name: String,
    description: Option<String>,
    is_default: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MailingListRow> for MailingList {
    fn from(row: MailingListRow) -> Self {
        Self {
            id: MailingListId::new(row.id),
            slug: row.slug,
            name: row.name,
            description: row.description,
            is_default: row.is_default,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for inserting a new mailing list.
#[derive(Debug, Clone)]
pub struct NewMailingList<'a> {
    /// URL-safe unique identifier.
    pub slug: &'a str,
    /// Human-readable name.
    pub name: &'a str,
    /// Optional description.
    pub description: Option<&'a str>,
    /// Auto-subscribed for every new account.
    pub is_default: bool,
}

/// Repository for mailing list database operations.
pub struct MailingListRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MailingListRepository<'a> {
    /// Create a new mailing list repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a mailing list by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: MailingListId,
    ) -> Result<Option<MailingList>, RepositoryError> {
        let row: Option<MailingListRow> = sqlx::query_as(&format!(
            "SELECT {LIST_COLUMNS} FROM listkeeper.mailing_list WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(MailingList::from))
    }

    /// Get a mailing list by its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<MailingList>, RepositoryError> {
        let row: Option<MailingListRow> = sqlx::query_as(&format!(
            "SELECT {LIST_COLUMNS} FROM listkeeper.mailing_list WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(MailingList::from))
    }

    /// Create a new mailing list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug already exists.
    pub async fn create(&self, new: NewMailingList<'_>) -> Result<MailingList, RepositoryError> {
        let row: MailingListRow = sqlx::query_as(&format!(
            "INSERT INTO listkeeper.mailing_list (slug, name, description, is_default) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {LIST_COLUMNS}"
        ))
        .bind(new.slug)
        .bind(new.name)
        .bind(new.description)
        .bind(new.is_default)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("mailing list slug already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Get a mailing list by slug, creating it lazily if absent.
    ///
    /// The lazily created list uses the slug as its name and is active but
    /// not a default list. Safe under concurrent callers: the insert uses
    /// `ON CONFLICT DO NOTHING` and falls back to a re-read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create_by_slug(
        &self,
        slug: &str,
    ) -> Result<MailingList, RepositoryError> {
        if let Some(list) = self.get_by_slug(slug).await? {
            return Ok(list);
        }

        let inserted: Option<MailingListRow> = sqlx::query_as(&format!(
            "INSERT INTO listkeeper.mailing_list (slug, name) \
             VALUES ($1, $1) \
             ON CONFLICT (slug) DO NOTHING \
             RETURNING {LIST_COLUMNS}"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(row.into()),
            // Lost the race to a concurrent creator; the row exists now.
            None => self
                .get_by_slug(slug)
                .await?
                .ok_or(RepositoryError::NotFound),
        }
    }

    /// Get every active default list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_defaults(&self) -> Result<Vec<MailingList>, RepositoryError> {
        let rows: Vec<MailingListRow> = sqlx::query_as(&format!(
            "SELECT {LIST_COLUMNS} FROM listkeeper.mailing_list \
             WHERE is_default AND is_active ORDER BY id ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(MailingList::from).collect())
    }
}
