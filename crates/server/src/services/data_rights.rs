//! Data rights: export and erasure of a contact's subscription data.
//!
//! Export is a pure read. Erasure is a hard, irreversible delete - the
//! "right to be forgotten" path deliberately does not soft-delete; the
//! subscription and token rows disappear via the DDL cascade.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use listkeeper_core::{AccountId, ContactId, ContactKind, SubscriptionStatus};

use super::EngineError;
use crate::db::{ContactRepository, SubscriptionRepository};

/// Everything stored about one account's contacts.
#[derive(Debug, Serialize)]
pub struct ContactDataExport {
    /// The account the export is for.
    pub account_id: AccountId,
    /// Every contact owned by the account.
    pub contacts: Vec<ContactExport>,
}

/// One exported contact with its subscriptions nested.
#[derive(Debug, Serialize)]
pub struct ContactExport {
    /// Contact ID.
    pub id: ContactId,
    /// Address kind.
    pub kind: ContactKind,
    /// Normalized address value.
    pub value: String,
    /// Whether this is the owner's primary contact of its kind.
    pub is_primary: bool,
    /// Whether the address is verified.
    pub is_verified: bool,
    /// When the address was verified.
    pub verified_at: Option<DateTime<Utc>>,
    /// Provenance tag.
    pub source: String,
    /// When the contact was created.
    pub created_at: DateTime<Utc>,
    /// The contact's subscriptions.
    pub subscriptions: Vec<SubscriptionExport>,
}

/// One exported subscription.
#[derive(Debug, Serialize)]
pub struct SubscriptionExport {
    /// Slug of the mailing list.
    pub list_slug: String,
    /// Name of the mailing list.
    pub list_name: String,
    /// Current lifecycle state.
    pub status: SubscriptionStatus,
    /// When consent was last established.
    pub opt_in_at: Option<DateTime<Utc>>,
    /// When the contact last opted out.
    pub opt_out_at: Option<DateTime<Utc>>,
}

/// Service for export and erasure requests.
pub struct DataRightsService<'a> {
    pool: &'a PgPool,
}

impl<'a> DataRightsService<'a> {
    /// Create a new data rights service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Export every contact owned by the account with nested subscriptions.
    ///
    /// A pure read: an account with no contacts yields an empty export, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Repository` if a query fails.
    pub async fn export_contact_data(
        &self,
        account_id: AccountId,
    ) -> Result<ContactDataExport, EngineError> {
        let contacts = ContactRepository::new(self.pool)
            .list_by_owner(account_id)
            .await?;

        let subscription_repo = SubscriptionRepository::new(self.pool);
        let mut exports = Vec::with_capacity(contacts.len());

        for contact in contacts {
            let subscriptions = subscription_repo
                .list_for_contact(contact.id)
                .await?
                .into_iter()
                .map(|with_list| SubscriptionExport {
                    list_slug: with_list.list_slug,
                    list_name: with_list.list_name,
                    status: with_list.subscription.status,
                    opt_in_at: with_list.subscription.opt_in_at,
                    opt_out_at: with_list.subscription.opt_out_at,
                })
                .collect();

            exports.push(ContactExport {
                id: contact.id,
                kind: contact.address.kind(),
                value: contact.address.value().to_owned(),
                is_primary: contact.is_primary,
                is_verified: contact.is_verified,
                verified_at: contact.verified_at,
                source: contact.source,
                created_at: contact.created_at,
                subscriptions,
            });
        }

        Ok(ContactDataExport {
            account_id,
            contacts: exports,
        })
    }

    /// Hard-delete every contact owned by the account.
    ///
    /// Subscriptions and verification tokens cascade away with the contacts.
    ///
    /// # Returns
    ///
    /// The number of contacts removed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` when the account owns no contacts.
    pub async fn delete_contact_data(&self, account_id: AccountId) -> Result<u64, EngineError> {
        let deleted = ContactRepository::new(self.pool)
            .delete_by_owner(account_id)
            .await?;

        if deleted == 0 {
            return Err(EngineError::NotFound(
                "account has no contacts".to_owned(),
            ));
        }

        tracing::info!(account_id = %account_id, deleted, "Contact data erased");
        Ok(deleted)
    }
}
