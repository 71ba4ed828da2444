//! Contact subscription domain types.

use chrono::{DateTime, Utc};

use listkeeper_core::{ContactId, MailingListId, SubscriptionId, SubscriptionStatus};

/// One contact's relationship to one mailing list (domain type).
///
/// Rows are unique per (contact, list). Status history is preserved with
/// soft-delete semantics: unsubscribe keeps the row and its consent
/// timestamps; only contact erasure removes it.
#[derive(Debug, Clone)]
pub struct ContactSubscription {
    /// Unique subscription ID.
    pub id: SubscriptionId,
    /// The contact this subscription belongs to.
    pub contact_id: ContactId,
    /// The list this subscription is for.
    pub mailing_list_id: MailingListId,
    /// Current lifecycle state.
    pub status: SubscriptionStatus,
    /// When consent was last established (confirmation or auto-confirm).
    pub opt_in_at: Option<DateTime<Utc>>,
    /// When the contact last opted out.
    pub opt_out_at: Option<DateTime<Utc>>,
    /// Requester IP captured at confirmation.
    pub opt_in_ip: Option<String>,
    /// Requester user-agent captured at confirmation.
    pub opt_in_user_agent: Option<String>,
    /// Reason codes, complaint types, provenance.
    pub metadata: serde_json::Value,
    /// When the subscription row was created.
    pub created_at: DateTime<Utc>,
    /// When the subscription row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A subscription joined with its list's identity, for exports.
#[derive(Debug, Clone)]
pub struct SubscriptionWithList {
    /// The subscription itself.
    pub subscription: ContactSubscription,
    /// Slug of the mailing list.
    pub list_slug: String,
    /// Name of the mailing list.
    pub list_name: String,
}
