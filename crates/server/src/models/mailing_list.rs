//! Mailing list domain type.

use chrono::{DateTime, Utc};

use listkeeper_core::MailingListId;

/// A named audience (domain type).
///
/// Lists marked `is_default` are auto-subscribed for every newly linked
/// account. Lists are created administratively or lazily on first
/// subscribe-by-slug; the engine never hard-deletes them.
#[derive(Debug, Clone)]
pub struct MailingList {
    /// Unique list ID.
    pub id: MailingListId,
    /// URL-safe unique identifier.
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    /// Optional description shown in preference UIs.
    pub description: Option<String>,
    /// Auto-subscribed for every new account.
    pub is_default: bool,
    /// Inactive lists accept no new subscriptions via the public endpoint.
    pub is_active: bool,
    /// When the list was created.
    pub created_at: DateTime<Utc>,
    /// When the list was last updated.
    pub updated_at: DateTime<Utc>,
}
