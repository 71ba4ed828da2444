//! Subscription state machine.
//!
//! Owns the per-(contact, list) status and its transitions:
//!
//! ```text
//! absent ──subscribe──▶ pending ──confirm──▶ subscribed
//!                          │                     │
//!                          │◀────resubscribe─────┤
//!                          │                unsubscribe
//!                          │                     ▼
//!                          │◀──resubscribe── unsubscribed
//!                          │
//!   any state ──provider feedback──▶ bounced ──resubscribe──▶ pending
//! ```
//!
//! The transition rules are pure functions (`plan_subscribe`,
//! `plan_unsubscribe`); the service applies the chosen plan through the
//! repositories. Re-subscribing a `bounced` address always restarts at
//! `pending`: suppressed addresses are never trusted implicitly, so
//! auto-confirm is ignored for them regardless of list settings.

use chrono::Utc;
use sqlx::PgPool;

use listkeeper_core::{ContactId, MailingListId, SubscriptionStatus, SuppressionKind};

use super::EngineError;
use crate::db::subscriptions::NewSubscription;
use crate::db::{MailingListRepository, SubscriptionRepository};
use crate::models::{ContactSubscription, MailingList};

/// How the caller names the target list.
#[derive(Debug, Clone)]
pub enum ListSelector {
    /// By numeric ID (must exist).
    Id(MailingListId),
    /// By slug (created lazily if absent).
    Slug(String),
}

/// Options for a subscribe call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions<'a> {
    /// Skip the verification token step (trusted channel only).
    pub auto_confirm: bool,
    /// Requester IP, recorded when auto-confirming.
    pub opt_in_ip: Option<&'a str>,
    /// Requester user-agent, recorded when auto-confirming.
    pub opt_in_user_agent: Option<&'a str>,
}

/// What a subscribe call should do to the (contact, list) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscribePlan {
    /// No row exists; insert one in the given state.
    Create(SubscriptionStatus),
    /// A row exists; restart its consent cycle in the given state.
    Restart(SubscriptionStatus),
    /// A pending row exists; return it unchanged (idempotent).
    KeepPending,
}

/// Decide the subscribe transition for the current state.
///
/// The only transition a repeated subscribe call makes for an existing row
/// is out of `unsubscribed` or `bounced`; a second subscribe on a
/// `subscribed` row is a conflict, and on a `pending` row a no-op.
fn plan_subscribe(
    existing: Option<SubscriptionStatus>,
    auto_confirm: bool,
) -> Result<SubscribePlan, EngineError> {
    let confirmed_status = if auto_confirm {
        SubscriptionStatus::Subscribed
    } else {
        SubscriptionStatus::Pending
    };

    match existing {
        None => Ok(SubscribePlan::Create(confirmed_status)),
        Some(SubscriptionStatus::Pending) => Ok(SubscribePlan::KeepPending),
        Some(SubscriptionStatus::Subscribed) => {
            Err(EngineError::Conflict("already subscribed".to_owned()))
        }
        Some(SubscriptionStatus::Unsubscribed) => Ok(SubscribePlan::Restart(confirmed_status)),
        // A suppressed address must re-verify: auto-confirm is ignored.
        Some(SubscriptionStatus::Bounced) => Ok(SubscribePlan::Restart(SubscriptionStatus::Pending)),
    }
}

/// What an unsubscribe call should do to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnsubscribePlan {
    /// Mark the row unsubscribed.
    MarkUnsubscribed,
    /// Already unsubscribed; return the row unchanged (idempotent).
    AlreadyUnsubscribed,
    /// The row is bounced; suppression wins over user transitions.
    SuppressionWins,
}

const fn plan_unsubscribe(status: SubscriptionStatus) -> UnsubscribePlan {
    match status {
        SubscriptionStatus::Pending | SubscriptionStatus::Subscribed => {
            UnsubscribePlan::MarkUnsubscribed
        }
        SubscriptionStatus::Unsubscribed => UnsubscribePlan::AlreadyUnsubscribed,
        SubscriptionStatus::Bounced => UnsubscribePlan::SuppressionWins,
    }
}

/// Service owning subscription status transitions.
pub struct SubscriptionService<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionService<'a> {
    /// Create a new subscription service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a list selector to a mailing list.
    ///
    /// Selecting by slug lazily creates a missing list; selecting by ID
    /// never does.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for an unknown ID and
    /// `EngineError::Validation` for an empty slug.
    pub async fn resolve_list(&self, selector: &ListSelector) -> Result<MailingList, EngineError> {
        let repo = MailingListRepository::new(self.pool);

        match selector {
            ListSelector::Id(id) => repo
                .get_by_id(*id)
                .await?
                .ok_or_else(|| EngineError::NotFound("mailing list not found".to_owned())),
            ListSelector::Slug(slug) => {
                let slug = slug.trim();
                if slug.is_empty() {
                    return Err(EngineError::Validation(
                        "mailing list slug cannot be empty".to_owned(),
                    ));
                }
                Ok(repo.get_or_create_by_slug(slug).await?)
            }
        }
    }

    /// Subscribe a contact to a list.
    ///
    /// Creates a `pending` row (or `subscribed` with `auto_confirm`),
    /// restarts the consent cycle for `unsubscribed`/`bounced` rows, and is
    /// idempotent for rows already `pending`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Conflict` if the row is already `subscribed`,
    /// and `EngineError::Validation` if the list no longer accepts
    /// subscriptions.
    pub async fn subscribe(
        &self,
        contact_id: ContactId,
        list: &MailingList,
        opts: SubscribeOptions<'_>,
    ) -> Result<ContactSubscription, EngineError> {
        if !list.is_active {
            return Err(EngineError::Validation(format!(
                "mailing list '{}' is not accepting subscriptions",
                list.slug
            )));
        }

        let repo = SubscriptionRepository::new(self.pool);
        let existing = repo.get(contact_id, list.id).await?;

        let plan = plan_subscribe(existing.as_ref().map(|s| s.status), opts.auto_confirm)?;

        match (plan, existing) {
            (SubscribePlan::KeepPending, Some(sub)) => Ok(sub),
            (SubscribePlan::Create(status), _) => {
                let opt_in_at = status.is_sendable().then(Utc::now);
                let sub = repo
                    .insert(NewSubscription {
                        contact_id,
                        mailing_list_id: list.id,
                        status,
                        opt_in_at,
                        opt_in_ip: status.is_sendable().then_some(opts.opt_in_ip).flatten(),
                        opt_in_user_agent: status
                            .is_sendable()
                            .then_some(opts.opt_in_user_agent)
                            .flatten(),
                    })
                    .await?;
                tracing::info!(
                    contact_id = %contact_id,
                    list = %list.slug,
                    status = %sub.status,
                    "Subscription created"
                );
                Ok(sub)
            }
            (SubscribePlan::Restart(status), Some(sub)) => {
                let opt_in_at = status.is_sendable().then(Utc::now);
                let sub = repo
                    .restart_consent(
                        sub.id,
                        status,
                        opt_in_at,
                        status.is_sendable().then_some(opts.opt_in_ip).flatten(),
                        status
                            .is_sendable()
                            .then_some(opts.opt_in_user_agent)
                            .flatten(),
                    )
                    .await?;
                tracing::info!(
                    contact_id = %contact_id,
                    list = %list.slug,
                    status = %sub.status,
                    "Subscription consent cycle restarted"
                );
                Ok(sub)
            }
            // plan_subscribe only yields KeepPending/Restart when a row exists
            (SubscribePlan::KeepPending | SubscribePlan::Restart(_), None) => Err(
                EngineError::Repository(crate::db::RepositoryError::NotFound),
            ),
        }
    }

    /// Unsubscribe a contact from a list.
    ///
    /// Sets `opt_out_at` and records the reason; `opt_in_at` from the prior
    /// consent is preserved. Idempotent for already-unsubscribed rows; a
    /// `bounced` row is left bounced (suppression wins).
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if no subscription exists for the
    /// (contact, list) pair.
    pub async fn unsubscribe(
        &self,
        contact_id: ContactId,
        mailing_list_id: MailingListId,
        reason: Option<&str>,
    ) -> Result<ContactSubscription, EngineError> {
        let repo = SubscriptionRepository::new(self.pool);

        let Some(sub) = repo.get(contact_id, mailing_list_id).await? else {
            return Err(EngineError::NotFound("subscription not found".to_owned()));
        };

        match plan_unsubscribe(sub.status) {
            UnsubscribePlan::MarkUnsubscribed => {
                let sub = repo.mark_unsubscribed(sub.id, reason).await?;
                tracing::info!(
                    contact_id = %contact_id,
                    mailing_list_id = %mailing_list_id,
                    "Contact unsubscribed"
                );
                Ok(sub)
            }
            UnsubscribePlan::AlreadyUnsubscribed | UnsubscribePlan::SuppressionWins => Ok(sub),
        }
    }

    /// Force every active subscription of a contact into `bounced`.
    ///
    /// Called by the suppression handler; see
    /// [`SubscriptionRepository::suppress_contact`] for the transaction
    /// semantics.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the contact doesn't exist.
    pub async fn suppress(
        &self,
        contact_id: ContactId,
        kind: SuppressionKind,
        detail: Option<&str>,
    ) -> Result<u64, EngineError> {
        let suppressed = SubscriptionRepository::new(self.pool)
            .suppress_contact(contact_id, kind, detail)
            .await
            .map_err(|e| match e {
                crate::db::RepositoryError::NotFound => {
                    EngineError::NotFound("contact not found".to_owned())
                }
                other => other.into(),
            })?;

        tracing::warn!(
            contact_id = %contact_id,
            kind = %kind,
            suppressed,
            "Contact suppressed by provider feedback"
        );
        Ok(suppressed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_subscribe_creates_pending() {
        assert_eq!(
            plan_subscribe(None, false).unwrap(),
            SubscribePlan::Create(SubscriptionStatus::Pending)
        );
    }

    #[test]
    fn test_first_subscribe_with_auto_confirm_creates_subscribed() {
        assert_eq!(
            plan_subscribe(None, true).unwrap(),
            SubscribePlan::Create(SubscriptionStatus::Subscribed)
        );
    }

    #[test]
    fn test_subscribe_on_pending_is_idempotent() {
        assert_eq!(
            plan_subscribe(Some(SubscriptionStatus::Pending), false).unwrap(),
            SubscribePlan::KeepPending
        );
    }

    #[test]
    fn test_subscribe_on_subscribed_conflicts() {
        assert!(matches!(
            plan_subscribe(Some(SubscriptionStatus::Subscribed), false),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            plan_subscribe(Some(SubscriptionStatus::Subscribed), true),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn test_resubscribe_after_unsubscribe_restarts_cycle() {
        assert_eq!(
            plan_subscribe(Some(SubscriptionStatus::Unsubscribed), false).unwrap(),
            SubscribePlan::Restart(SubscriptionStatus::Pending)
        );
        assert_eq!(
            plan_subscribe(Some(SubscriptionStatus::Unsubscribed), true).unwrap(),
            SubscribePlan::Restart(SubscriptionStatus::Subscribed)
        );
    }

    #[test]
    fn test_resubscribe_after_bounce_never_auto_confirms() {
        assert_eq!(
            plan_subscribe(Some(SubscriptionStatus::Bounced), false).unwrap(),
            SubscribePlan::Restart(SubscriptionStatus::Pending)
        );
        // Even a trusted channel must go through verification again.
        assert_eq!(
            plan_subscribe(Some(SubscriptionStatus::Bounced), true).unwrap(),
            SubscribePlan::Restart(SubscriptionStatus::Pending)
        );
    }

    #[test]
    fn test_unsubscribe_from_active_states() {
        assert_eq!(
            plan_unsubscribe(SubscriptionStatus::Pending),
            UnsubscribePlan::MarkUnsubscribed
        );
        assert_eq!(
            plan_unsubscribe(SubscriptionStatus::Subscribed),
            UnsubscribePlan::MarkUnsubscribed
        );
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        assert_eq!(
            plan_unsubscribe(SubscriptionStatus::Unsubscribed),
            UnsubscribePlan::AlreadyUnsubscribed
        );
    }

    #[test]
    fn test_unsubscribe_never_revives_bounced() {
        assert_eq!(
            plan_unsubscribe(SubscriptionStatus::Bounced),
            UnsubscribePlan::SuppressionWins
        );
    }
}
