//! Verification token domain type.

use chrono::{DateTime, Utc};

use listkeeper_core::{ContactId, MailingListId, VerificationTokenId};

/// A single-use verification token (domain type).
///
/// Tokens link a contact to a pending list subscription. Consuming one sets
/// `used_at`, after which it can never again grant verification. Unused
/// tokens expire passively.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    /// Unique token ID.
    pub id: VerificationTokenId,
    /// Contact the token verifies.
    pub contact_id: ContactId,
    /// List subscription the token confirms.
    pub mailing_list_id: MailingListId,
    /// Opaque URL-safe token value (43 characters).
    pub token: String,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
    /// Issuance time plus the 24 hour validity window.
    pub expires_at: DateTime<Utc>,
    /// When the token was consumed, if ever.
    pub used_at: Option<DateTime<Utc>>,
}

impl VerificationToken {
    /// Whether the token has already been consumed.
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Whether the token has passed its validity window at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn token_at(expires_at: DateTime<Utc>, used_at: Option<DateTime<Utc>>) -> VerificationToken {
        VerificationToken {
            id: VerificationTokenId::new(1),
            contact_id: ContactId::new(1),
            mailing_list_id: MailingListId::new(1),
            token: "t".repeat(43),
            created_at: expires_at - Duration::hours(24),
            expires_at,
            used_at,
        }
    }

    #[test]
    fn test_expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let token = token_at(now, None);
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_used_token_reports_used() {
        let now = Utc::now();
        assert!(token_at(now, Some(now)).is_used());
        assert!(!token_at(now, None).is_used());
    }
}
