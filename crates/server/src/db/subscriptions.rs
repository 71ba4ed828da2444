//! Subscription repository for database operations.
//!
//! Owns the per-(contact, list) status rows. Multi-table transitions
//! (suppression) run inside a single transaction with the contact row locked,
//! so provider feedback serializes against user-driven transitions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use listkeeper_core::{ContactId, MailingListId, SubscriptionId, SubscriptionStatus, SuppressionKind};

use super::RepositoryError;
use crate::models::ContactSubscription;
use crate::models::subscription::SubscriptionWithList;

/// Columns selected for every subscription query, in `SubscriptionRow` order.
pub(crate) const SUBSCRIPTION_COLUMNS: &str =
    "id, contact_id, mailing_list_id, status, opt_in_at, opt_out_at, opt_in_ip, \
     opt_in_user_agent, metadata, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` subscription queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubscriptionRow {
    id: i32,
    contact_id: i32,
    mailing_list_id: i32,
    status: String,
    opt_in_at: Option<DateTime<Utc>>,
    opt_out_at: Option<DateTime<Utc>>,
    opt_in_ip: Option<String>,
    opt_in_user_agent: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for ContactSubscription {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status: SubscriptionStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid subscription status in database: {e}"))
        })?;

        Ok(Self {
            id: SubscriptionId::new(row.id),
            contact_id: ContactId::new(row.contact_id),
            mailing_list_id: MailingListId::new(row.mailing_list_id),
            status,
            opt_in_at: row.opt_in_at,
            opt_out_at: row.opt_out_at,
            opt_in_ip: row.opt_in_ip,
            opt_in_user_agent: row.opt_in_user_agent,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Internal row type for subscription-with-list queries (exports).
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionWithListRow {
    #[sqlx(flatten)]
    subscription: SubscriptionRow,
    list_slug: String,
    list_name: String,
}

/// Fields for inserting a new subscription row.
#[derive(Debug, Clone)]
pub struct NewSubscription<'a> {
    /// The contact to subscribe.
    pub contact_id: ContactId,
    /// The list to subscribe to.
    pub mailing_list_id: MailingListId,
    /// Initial state (`pending`, or `subscribed` for auto-confirm).
    pub status: SubscriptionStatus,
    /// Consent timestamp, set only for auto-confirmed rows.
    pub opt_in_at: Option<DateTime<Utc>>,
    /// Requester IP, when known at consent time.
    pub opt_in_ip: Option<&'a str>,
    /// Requester user-agent, when known at consent time.
    pub opt_in_user_agent: Option<&'a str>,
}

/// Repository for subscription database operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the subscription row for a (contact, list) pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        contact_id: ContactId,
        mailing_list_id: MailingListId,
    ) -> Result<Option<ContactSubscription>, RepositoryError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM listkeeper.contact_subscription \
             WHERE contact_id = $1 AND mailing_list_id = $2"
        ))
        .bind(contact_id)
        .bind(mailing_list_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(ContactSubscription::try_from).transpose()
    }

    /// Insert a new subscription row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a row for the (contact, list)
    /// pair already exists.
    pub async fn insert(
        &self,
        new: NewSubscription<'_>,
    ) -> Result<ContactSubscription, RepositoryError> {
        let row: SubscriptionRow = sqlx::query_as(&format!(
            "INSERT INTO listkeeper.contact_subscription \
                 (contact_id, mailing_list_id, status, opt_in_at, opt_in_ip, opt_in_user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(new.contact_id)
        .bind(new.mailing_list_id)
        .bind(new.status)
        .bind(new.opt_in_at)
        .bind(new.opt_in_ip)
        .bind(new.opt_in_user_agent)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("subscription already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    /// Restart the consent cycle on an existing row.
    ///
    /// Used when a contact re-subscribes after unsubscribing or bouncing:
    /// the status moves to `pending` (or `subscribed` for auto-confirm), the
    /// consent timestamp is refreshed - cleared for `pending`, stamped for
    /// `subscribed` - and the prior cycle's `opt_out_at` stays in history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row doesn't exist.
    pub async fn restart_consent(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
        opt_in_at: Option<DateTime<Utc>>,
        opt_in_ip: Option<&str>,
        opt_in_user_agent: Option<&str>,
    ) -> Result<ContactSubscription, RepositoryError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "UPDATE listkeeper.contact_subscription SET \
                 status = $2, \
                 opt_in_at = $3, \
                 opt_in_ip = $4, \
                 opt_in_user_agent = $5, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(opt_in_at)
        .bind(opt_in_ip)
        .bind(opt_in_user_agent)
        .fetch_optional(self.pool)
        .await?;

        row.map_or(Err(RepositoryError::NotFound), SubscriptionRow::try_into)
    }

    /// Mark a subscription unsubscribed.
    ///
    /// Sets `opt_out_at`, records the reason in metadata when given, and
    /// preserves `opt_in_at` (consent history is never erased by opt-out).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row doesn't exist.
    pub async fn mark_unsubscribed(
        &self,
        id: SubscriptionId,
        reason: Option<&str>,
    ) -> Result<ContactSubscription, RepositoryError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "UPDATE listkeeper.contact_subscription SET \
                 status = 'unsubscribed', \
                 opt_out_at = now(), \
                 metadata = metadata || jsonb_strip_nulls(jsonb_build_object('opt_out_reason', $2::text)), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(self.pool)
        .await?;

        row.map_or(Err(RepositoryError::NotFound), SubscriptionRow::try_into)
    }

    /// Force every active subscription of a contact into `bounced`.
    ///
    /// A bounce or complaint is an address-level signal, so suppression is
    /// cross-list. Runs in one transaction with the contact row locked:
    /// the lock serializes suppression against concurrent user-driven
    /// transitions and concurrent events for the same recipient. Rows that
    /// are already `bounced` or `unsubscribed` are left untouched, which
    /// makes event replay a no-op.
    ///
    /// # Returns
    ///
    /// The number of subscriptions moved to `bounced`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact doesn't exist.
    pub async fn suppress_contact(
        &self,
        contact_id: ContactId,
        kind: SuppressionKind,
        detail: Option<&str>,
    ) -> Result<u64, RepositoryError> {
        let complaint_type = match kind {
            SuppressionKind::SpamComplaint => detail,
            SuppressionKind::HardBounce => None,
        };

        let mut tx = self.pool.begin().await?;

        let locked: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM listkeeper.contact WHERE id = $1 FOR UPDATE")
                .bind(contact_id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let suppressed = sqlx::query(
            "UPDATE listkeeper.contact_subscription SET \
                 status = 'bounced', \
                 opt_out_at = now(), \
                 metadata = metadata || jsonb_strip_nulls(\
                     jsonb_build_object('opt_out_reason', $2::text, 'complaint_type', $3::text)), \
                 updated_at = now() \
             WHERE contact_id = $1 AND status IN ('pending', 'subscribed')",
        )
        .bind(contact_id)
        .bind(kind.as_str())
        .bind(complaint_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "UPDATE listkeeper.contact SET \
                 is_verified = FALSE, \
                 metadata = metadata || jsonb_build_object('bounce_type', $2::text), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(contact_id)
        .bind(detail.unwrap_or(kind.as_str()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(suppressed)
    }

    /// Get all subscriptions for a contact joined with list identity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_contact(
        &self,
        contact_id: ContactId,
    ) -> Result<Vec<SubscriptionWithList>, RepositoryError> {
        let rows: Vec<SubscriptionWithListRow> = sqlx::query_as(
            "SELECT s.id, s.contact_id, s.mailing_list_id, s.status, s.opt_in_at, \
                    s.opt_out_at, s.opt_in_ip, s.opt_in_user_agent, s.metadata, \
                    s.created_at, s.updated_at, \
                    l.slug AS list_slug, l.name AS list_name \
             FROM listkeeper.contact_subscription s \
             JOIN listkeeper.mailing_list l ON l.id = s.mailing_list_id \
             WHERE s.contact_id = $1 \
             ORDER BY s.created_at ASC",
        )
        .bind(contact_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SubscriptionWithList {
                    subscription: row.subscription.try_into()?,
                    list_slug: row.list_slug,
                    list_name: row.list_name,
                })
            })
            .collect()
    }
}
