//! Verification token repository for database operations.
//!
//! Token consumption is the one three-table transition in the engine: it
//! marks the token used, the contact verified, and the subscription
//! `subscribed`, atomically. The `used_at IS NULL` guard on the claiming
//! UPDATE makes consumption exactly-once under concurrency: the first
//! transaction to claim the row wins, every other caller observes the token
//! as already used.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use listkeeper_core::{ContactId, MailingListId, SubscriptionStatus, VerificationTokenId};

use super::RepositoryError;
use super::contacts::{CONTACT_COLUMNS, ContactRow};
use super::subscriptions::{SUBSCRIPTION_COLUMNS, SubscriptionRow};
use crate::models::{Contact, ContactSubscription, VerificationToken};

/// Columns selected for every token query, in `TokenRow` order.
const TOKEN_COLUMNS: &str =
    "id, contact_id, mailing_list_id, token, created_at, expires_at, used_at";

/// Internal row type for `PostgreSQL` token queries.
#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: i32,
    contact_id: i32,
    mailing_list_id: i32,
    token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for VerificationToken {
    fn from(row: TokenRow) -> Self {
        Self {
            id: VerificationTokenId::new(row.id),
            contact_id: ContactId::new(row.contact_id),
            mailing_list_id: MailingListId::new(row.mailing_list_id),
            token: row.token,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used_at: row.used_at,
        }
    }
}

/// Result of a consume attempt, disambiguated for the error taxonomy.
#[derive(Debug)]
pub enum ConsumeOutcome {
    /// The token was consumed; contact and subscription were updated.
    Consumed {
        /// The now-verified contact.
        contact: Box<Contact>,
        /// The now-subscribed subscription.
        subscription: Box<ContactSubscription>,
    },
    /// No token with this value exists.
    Missing,
    /// The token's validity window has passed.
    Expired,
    /// The token was already consumed (possibly by a concurrent request).
    AlreadyUsed,
    /// The token's subscription row no longer exists.
    SubscriptionMissing,
    /// The subscription is not awaiting confirmation.
    NotPending(SubscriptionStatus),
}

/// Repository for verification token database operations.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count tokens issued for a contact since the given instant.
    ///
    /// The count is evaluated against the durable store, so the issuance
    /// rate limit holds across concurrent service instances.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_issued_since(
        &self,
        contact_id: ContactId,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM listkeeper.verification_token \
             WHERE contact_id = $1 AND created_at > $2",
        )
        .bind(contact_id)
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Insert a freshly generated token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact or list doesn't
    /// exist. Returns `RepositoryError::Conflict` on a token value collision
    /// (practically unreachable with 256-bit random values).
    pub async fn insert(
        &self,
        contact_id: ContactId,
        mailing_list_id: MailingListId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationToken, RepositoryError> {
        let row: TokenRow = sqlx::query_as(&format!(
            "INSERT INTO listkeeper.verification_token \
                 (contact_id, mailing_list_id, token, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(contact_id)
        .bind(mailing_list_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_foreign_key_violation() {
                    return RepositoryError::NotFound;
                }
                if db_err.is_unique_violation() {
                    return RepositoryError::Conflict("token value collision".to_owned());
                }
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Get a token by its exact value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_value(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, RepositoryError> {
        let row: Option<TokenRow> = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM listkeeper.verification_token WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(VerificationToken::from))
    }

    /// Consume a token: atomically mark it used, verify its contact, and
    /// move its subscription to `subscribed`.
    ///
    /// All three writes commit together or not at all; a token is left
    /// unused whenever the subscription update cannot be applied.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; all domain
    /// failures are reported through [`ConsumeOutcome`].
    pub async fn consume(
        &self,
        token: &str,
        opt_in_ip: Option<&str>,
        opt_in_user_agent: Option<&str>,
    ) -> Result<ConsumeOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Claim the token. Exactly one transaction can see used_at IS NULL.
        let claimed: Option<(i32, i32)> = sqlx::query_as(
            "UPDATE listkeeper.verification_token SET used_at = now() \
             WHERE token = $1 AND used_at IS NULL AND expires_at > now() \
             RETURNING contact_id, mailing_list_id",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((contact_id, mailing_list_id)) = claimed else {
            // Claim failed; read the row to name the reason. The dropped
            // transaction rolls back.
            let state: Option<(Option<DateTime<Utc>>, DateTime<Utc>)> = sqlx::query_as(
                "SELECT used_at, expires_at FROM listkeeper.verification_token WHERE token = $1",
            )
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?;

            return Ok(match state {
                None => ConsumeOutcome::Missing,
                Some((Some(_), _)) => ConsumeOutcome::AlreadyUsed,
                Some((None, _)) => ConsumeOutcome::Expired,
            });
        };

        // Lock contact before subscription, the same order the suppression
        // transaction takes, so the two never deadlock.
        sqlx::query("SELECT id FROM listkeeper.contact WHERE id = $1 FOR UPDATE")
            .bind(contact_id)
            .execute(&mut *tx)
            .await?;

        let sub_row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM listkeeper.contact_subscription \
             WHERE contact_id = $1 AND mailing_list_id = $2 FOR UPDATE"
        ))
        .bind(contact_id)
        .bind(mailing_list_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(sub_row) = sub_row else {
            return Ok(ConsumeOutcome::SubscriptionMissing);
        };
        let current: ContactSubscription = sub_row.try_into()?;

        if current.status != SubscriptionStatus::Pending {
            // Roll back so the token stays unused.
            return Ok(ConsumeOutcome::NotPending(current.status));
        }

        let sub_row: SubscriptionRow = sqlx::query_as(&format!(
            "UPDATE listkeeper.contact_subscription SET \
                 status = 'subscribed', \
                 opt_in_at = now(), \
                 opt_in_ip = $2, \
                 opt_in_user_agent = $3, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(current.id)
        .bind(opt_in_ip)
        .bind(opt_in_user_agent)
        .fetch_one(&mut *tx)
        .await?;

        let contact_row: ContactRow = sqlx::query_as(&format!(
            "UPDATE listkeeper.contact SET \
                 is_verified = TRUE, \
                 verified_at = COALESCE(verified_at, now()), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(contact_id)
        .fetch_one(&mut *tx)
        .await?;

        let subscription: ContactSubscription = sub_row.try_into()?;
        let contact: Contact = contact_row.try_into()?;

        tx.commit().await?;

        Ok(ConsumeOutcome::Consumed {
            contact: Box::new(contact),
            subscription: Box::new(subscription),
        })
    }
}
