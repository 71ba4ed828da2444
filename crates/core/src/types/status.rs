//! Status enums for subscriptions and suppression events.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error parsing a [`SubscriptionStatus`] from its string form.
#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown subscription status: {0}")]
pub struct SubscriptionStatusError(String);

/// The state of one contact's relationship to one mailing list.
///
/// Transitions are owned by the subscription state machine in the server
/// crate; this type only carries the value and its stable string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Awaiting double opt-in confirmation.
    #[default]
    Pending,
    /// Confirmed and sendable.
    Subscribed,
    /// Voluntarily opted out.
    Unsubscribed,
    /// Suppressed by delivery-provider feedback.
    Bounced,
}

impl SubscriptionStatus {
    /// Stable string form used in the database and on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::Bounced => "bounced",
        }
    }

    /// Whether this subscription may currently receive list mail.
    #[must_use]
    pub const fn is_sendable(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = SubscriptionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "subscribed" => Ok(Self::Subscribed),
            "unsubscribed" => Ok(Self::Unsubscribed),
            "bounced" => Ok(Self::Bounced),
            other => Err(SubscriptionStatusError(other.to_owned())),
        }
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for SubscriptionStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for SubscriptionStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse::<Self>()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for SubscriptionStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

/// Why a contact was suppressed.
///
/// A suppression is address-level: it applies to every subscription of the
/// affected contact, not just the list the message was sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuppressionKind {
    /// Permanent delivery failure (invalid mailbox, blocked).
    HardBounce,
    /// Recipient marked the message as spam.
    SpamComplaint,
}

impl SuppressionKind {
    /// Stable string form recorded as the subscription's opt-out reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HardBounce => "hard-bounce",
            Self::SpamComplaint => "spam-complaint",
        }
    }
}

impl fmt::Display for SuppressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Subscribed,
            SubscriptionStatus::Unsubscribed,
            SubscriptionStatus::Bounced,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("active".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::Unsubscribed).unwrap(),
            "\"unsubscribed\""
        );
        let parsed: SubscriptionStatus = serde_json::from_str("\"bounced\"").unwrap();
        assert_eq!(parsed, SubscriptionStatus::Bounced);
    }

    #[test]
    fn test_only_subscribed_is_sendable() {
        assert!(SubscriptionStatus::Subscribed.is_sendable());
        assert!(!SubscriptionStatus::Pending.is_sendable());
        assert!(!SubscriptionStatus::Unsubscribed.is_sendable());
        assert!(!SubscriptionStatus::Bounced.is_sendable());
    }

    #[test]
    fn test_suppression_kind_reason_strings() {
        assert_eq!(SuppressionKind::HardBounce.as_str(), "hard-bounce");
        assert_eq!(SuppressionKind::SpamComplaint.as_str(), "spam-complaint");
    }
}
