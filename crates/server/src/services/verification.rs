//! Verification token issuance and consumption.
//!
//! Tokens are 32 cryptographically random bytes, URL-safe base64 encoded to
//! a fixed 43 characters, valid for 24 hours, and single-use. Issuance is
//! rate limited per contact by counting recently stored tokens, so the limit
//! holds across concurrent service instances without shared memory.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;

use listkeeper_core::{ContactId, MailingListId};

use super::EngineError;
use crate::db::tokens::ConsumeOutcome;
use crate::db::{RepositoryError, TokenRepository};
use crate::models::{Contact, ContactSubscription, VerificationToken};

/// Random bytes per token (encodes to 43 URL-safe characters).
const TOKEN_BYTES: usize = 32;

/// Validity window for a freshly issued token.
const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Rolling window for the issuance rate limit.
const RATE_LIMIT_WINDOW_SECS: i64 = 60;

/// Maximum tokens per contact within the rolling window.
const RATE_LIMIT_MAX_TOKENS: i64 = 3;

/// Encode raw token bytes to the URL-safe wire form.
fn encode_token(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a fresh cryptographically random token value.
fn generate_token_value() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    encode_token(&bytes)
}

/// Service owning the verification token lifecycle.
pub struct VerificationService<'a> {
    pool: &'a PgPool,
}

impl<'a> VerificationService<'a> {
    /// Create a new verification service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Issue a verification token for a pending subscription.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::RateLimited` when the contact already received
    /// 3 tokens within the last minute, and `EngineError::NotFound` when the
    /// contact or list doesn't exist.
    pub async fn issue_token(
        &self,
        contact_id: ContactId,
        mailing_list_id: MailingListId,
    ) -> Result<VerificationToken, EngineError> {
        let repo = TokenRepository::new(self.pool);

        let window_start = Utc::now() - Duration::seconds(RATE_LIMIT_WINDOW_SECS);
        let recent = repo.count_issued_since(contact_id, window_start).await?;
        if recent >= RATE_LIMIT_MAX_TOKENS {
            tracing::warn!(
                contact_id = %contact_id,
                recent,
                "Verification token issuance rate limited"
            );
            return Err(EngineError::RateLimited);
        }

        let value = generate_token_value();
        let expires_at = Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS);

        let token = repo
            .insert(contact_id, mailing_list_id, &value, expires_at)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    EngineError::NotFound("contact or mailing list not found".to_owned())
                }
                other => other.into(),
            })?;

        tracing::info!(
            contact_id = %contact_id,
            mailing_list_id = %mailing_list_id,
            expires_at = %token.expires_at,
            "Verification token issued"
        );
        Ok(token)
    }

    /// Consume a token, verifying the contact and confirming the
    /// subscription atomically.
    ///
    /// Exactly-once: of two concurrent calls with the same value, one
    /// returns the updated records and the other `TokenAlreadyUsed`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::TokenInvalid` for an unknown value,
    /// `EngineError::TokenExpired` past the validity window,
    /// `EngineError::TokenAlreadyUsed` for a consumed token, and
    /// `EngineError::State` when the subscription is not `pending`.
    pub async fn consume_token(
        &self,
        token: &str,
        opt_in_ip: Option<&str>,
        opt_in_user_agent: Option<&str>,
    ) -> Result<(Contact, ContactSubscription), EngineError> {
        let outcome = TokenRepository::new(self.pool)
            .consume(token, opt_in_ip, opt_in_user_agent)
            .await?;

        match outcome {
            ConsumeOutcome::Consumed {
                contact,
                subscription,
            } => {
                tracing::info!(
                    contact_id = %contact.id,
                    mailing_list_id = %subscription.mailing_list_id,
                    "Subscription confirmed via token"
                );
                Ok((*contact, *subscription))
            }
            ConsumeOutcome::Missing => Err(EngineError::TokenInvalid),
            ConsumeOutcome::Expired => Err(EngineError::TokenExpired),
            ConsumeOutcome::AlreadyUsed => Err(EngineError::TokenAlreadyUsed),
            ConsumeOutcome::SubscriptionMissing => Err(EngineError::NotFound(
                "subscription for this token no longer exists".to_owned(),
            )),
            ConsumeOutcome::NotPending(status) => Err(EngineError::State(format!(
                "subscription is {status}, not pending"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_has_fixed_length() {
        // 32 bytes -> ceil(32 * 4 / 3) = 43 characters without padding.
        assert_eq!(generate_token_value().len(), 43);
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = generate_token_value();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token_value(), generate_token_value());
    }

    #[test]
    fn test_encode_token_known_vector() {
        assert_eq!(encode_token(&[0xff, 0xef, 0xbe]), "_---");
    }
}
