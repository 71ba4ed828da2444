//! Contact store: creation, upsert, and account linking.
//!
//! Requests are explicit tagged types validated before any store access;
//! loose payloads never reach the repositories. Linking a guest contact to
//! an account promotes ownership and verification (never demotes) and
//! triggers default-list auto-subscription as a side effect.

use sqlx::PgPool;

use listkeeper_core::{AccountId, ContactAddress, ContactKind};

use super::EngineError;
use super::subscriptions::{SubscribeOptions, SubscriptionService};
use crate::db::contacts::NewContact;
use crate::db::{ContactRepository, MailingListRepository};
use crate::models::{Contact, MailingList};

/// Request to create a contact outright.
#[derive(Debug, Clone)]
pub struct CreateContactRequest {
    /// Address kind.
    pub kind: ContactKind,
    /// Raw address value (normalized during validation).
    pub value: String,
    /// Provenance tag.
    pub source: String,
    /// Owning account, if already known.
    pub owner_account_id: Option<AccountId>,
    /// Whether this is the owner's primary contact of its kind.
    pub is_primary: bool,
}

/// Request to link a contact to an authenticated account (idempotent upsert).
#[derive(Debug, Clone)]
pub struct LinkContactRequest {
    /// Address kind.
    pub kind: ContactKind,
    /// Raw address value (normalized during validation).
    pub value: String,
    /// Provenance tag.
    pub source: String,
    /// The account the contact now belongs to.
    pub owner_account_id: AccountId,
    /// Whether this is the owner's primary contact of its kind.
    pub is_primary: bool,
    /// Whether the identity provider already verified this address.
    pub provider_verified: bool,
    /// The account opted into marketing at signup.
    pub marketing_opt_in: bool,
}

/// Service owning contact identity and account linkage.
pub struct ContactService<'a> {
    pool: &'a PgPool,
}

impl<'a> ContactService<'a> {
    /// Create a new contact service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a contact.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for a malformed address,
    /// `EngineError::Conflict` for a duplicate (kind, value), and
    /// `EngineError::Constraint` if it would create a second primary contact
    /// for the same owner and kind.
    pub async fn create_contact(&self, req: &CreateContactRequest) -> Result<Contact, EngineError> {
        let address = ContactAddress::parse(req.kind, &req.value)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let contact = ContactRepository::new(self.pool)
            .create(NewContact {
                address: &address,
                source: &req.source,
                owner_account_id: req.owner_account_id,
                is_primary: req.is_primary,
                is_verified: false,
            })
            .await?;

        tracing::info!(contact_id = %contact.id, kind = %req.kind, "Contact created");
        Ok(contact)
    }

    /// Get the contact for an address, creating a guest row if absent.
    ///
    /// Entry point for anonymous signups: the returned contact may already
    /// be owned and verified, in which case it is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for a malformed address.
    pub async fn get_or_create_guest(
        &self,
        address: &ContactAddress,
        source: &str,
    ) -> Result<Contact, EngineError> {
        let repo = ContactRepository::new(self.pool);

        if let Some(contact) = repo.get_by_address(address).await? {
            return Ok(contact);
        }

        match repo
            .create(NewContact {
                address,
                source,
                owner_account_id: None,
                is_primary: false,
                is_verified: false,
            })
            .await
        {
            Ok(contact) => Ok(contact),
            // Lost the race to a concurrent signup; the row exists now.
            Err(crate::db::RepositoryError::Conflict(_)) => repo
                .get_by_address(address)
                .await?
                .ok_or_else(|| EngineError::NotFound("contact not found".to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    /// Link a contact to an authenticated account (idempotent upsert).
    ///
    /// If the (kind, value) pair exists, its mutable fields are updated and
    /// ownership/verification are promoted; otherwise a new owned contact is
    /// created. The first time a contact gains an owner, it is
    /// auto-subscribed to every default list and - with `marketing_opt_in` -
    /// to the designated newsletter list, both auto-confirmed on the theory
    /// that the identity provider already proved the address. Subscriptions
    /// currently `bounced` still restart at `pending`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for a malformed address and
    /// `EngineError::Constraint` for a primary-contact conflict.
    pub async fn link_contact(
        &self,
        req: &LinkContactRequest,
        newsletter_slug: &str,
    ) -> Result<Contact, EngineError> {
        let address = ContactAddress::parse(req.kind, &req.value)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let repo = ContactRepository::new(self.pool);
        let existing = repo.get_by_address(&address).await?;

        let (contact, first_link) = match existing {
            Some(found) => {
                let first_link = found.is_guest();
                let promoted = repo
                    .promote(
                        found.id,
                        req.owner_account_id,
                        req.is_primary,
                        req.provider_verified,
                        &req.source,
                    )
                    .await?;
                (promoted, first_link)
            }
            None => {
                let created = repo
                    .create(NewContact {
                        address: &address,
                        source: &req.source,
                        owner_account_id: Some(req.owner_account_id),
                        is_primary: req.is_primary,
                        is_verified: req.provider_verified,
                    })
                    .await?;
                (created, true)
            }
        };

        if first_link {
            tracing::info!(
                contact_id = %contact.id,
                account_id = %req.owner_account_id,
                "Contact linked to account"
            );
            self.auto_subscribe_on_link(&contact, req.marketing_opt_in, newsletter_slug)
                .await?;
        }

        Ok(contact)
    }

    /// Auto-subscribe a newly linked contact to default lists and,
    /// optionally, the newsletter.
    async fn auto_subscribe_on_link(
        &self,
        contact: &Contact,
        marketing_opt_in: bool,
        newsletter_slug: &str,
    ) -> Result<(), EngineError> {
        let lists = MailingListRepository::new(self.pool).list_defaults().await?;

        for list in &lists {
            self.auto_subscribe(contact, list).await?;
        }

        if marketing_opt_in && !lists.iter().any(|l| l.slug == newsletter_slug) {
            let newsletter = MailingListRepository::new(self.pool)
                .get_or_create_by_slug(newsletter_slug)
                .await?;
            self.auto_subscribe(contact, &newsletter).await?;
        }

        Ok(())
    }

    /// Subscribe with auto-confirm, tolerating an existing subscription.
    async fn auto_subscribe(
        &self,
        contact: &Contact,
        list: &MailingList,
    ) -> Result<(), EngineError> {
        let result = SubscriptionService::new(self.pool)
            .subscribe(
                contact.id,
                list,
                SubscribeOptions {
                    auto_confirm: true,
                    ..SubscribeOptions::default()
                },
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(EngineError::Conflict(_)) => {
                tracing::debug!(
                    contact_id = %contact.id,
                    list = %list.slug,
                    "Already subscribed, skipping auto-subscribe"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
