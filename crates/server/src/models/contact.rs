//! Contact domain types.

use chrono::{DateTime, Utc};

use listkeeper_core::{AccountId, ContactAddress, ContactId};

/// A communication address known to the engine (domain type).
///
/// A contact with no owner is a "guest" contact; linking it to an account is
/// a promotion and never demotes ownership or verification.
#[derive(Debug, Clone)]
pub struct Contact {
    /// Unique contact ID.
    pub id: ContactId,
    /// The normalized address (kind + value).
    pub address: ContactAddress,
    /// Account in the external identity provider that owns this contact.
    pub owner_account_id: Option<AccountId>,
    /// Whether this is the owner's primary contact of its kind.
    pub is_primary: bool,
    /// Whether the address passed double opt-in (or provider) verification.
    pub is_verified: bool,
    /// When the address was verified.
    pub verified_at: Option<DateTime<Utc>>,
    /// Free-text provenance tag (e.g. "signup-form", "checkout").
    pub source: String,
    /// Open key/value bag (bounce type, provider hints).
    pub metadata: serde_json::Value,
    /// When the contact was created.
    pub created_at: DateTime<Utc>,
    /// When the contact was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Whether this contact has not been linked to an account yet.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.owner_account_id.is_none()
    }
}
