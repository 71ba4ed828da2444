//! Integration tests for delivery-provider feedback handling.

use listkeeper_core::{ContactAddress, Email, SubscriptionStatus};
use listkeeper_integration_tests::{test_pool, unique_email, unique_slug};
use listkeeper_server::db::{ContactRepository, SubscriptionRepository};
use listkeeper_server::services::contacts::ContactService;
use listkeeper_server::services::subscriptions::{
    ListSelector, SubscribeOptions, SubscriptionService,
};
use listkeeper_server::services::suppression::{DeliveryEvent, SuppressionService};
use sqlx::PgPool;

fn bounce(email: &str, kind: Option<&str>, status: Option<&str>) -> DeliveryEvent {
    DeliveryEvent {
        event: "bounce".to_owned(),
        email: email.to_owned(),
        kind: kind.map(str::to_owned),
        status: status.map(str::to_owned),
        reason: None,
    }
}

fn spam_report(email: &str) -> DeliveryEvent {
    DeliveryEvent {
        event: "spamreport".to_owned(),
        email: email.to_owned(),
        kind: None,
        status: None,
        reason: None,
    }
}

/// Subscribe a fresh contact to `lists` lazily created lists, auto-confirmed.
async fn subscribed_contact(
    pool: &PgPool,
    prefix: &str,
    lists: usize,
) -> (listkeeper_server::models::Contact, Vec<i32>) {
    let email = Email::parse(&unique_email(prefix)).expect("valid test email");
    let contact = ContactService::new(pool)
        .get_or_create_guest(&ContactAddress::Email(email), "integration-test")
        .await
        .expect("contact creation failed");

    let service = SubscriptionService::new(pool);
    let mut list_ids = Vec::with_capacity(lists);
    for _ in 0..lists {
        let list = service
            .resolve_list(&ListSelector::Slug(unique_slug(prefix)))
            .await
            .expect("list creation failed");
        service
            .subscribe(
                contact.id,
                &list,
                SubscribeOptions {
                    auto_confirm: true,
                    ..SubscribeOptions::default()
                },
            )
            .await
            .expect("subscribe failed");
        list_ids.push(list.id.as_i32());
    }

    (contact, list_ids)
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_hard_bounce_suppresses_every_list() {
    let pool = test_pool().await;
    let (contact, list_ids) = subscribed_contact(&pool, "hardbounce", 2).await;

    let report = SuppressionService::new(pool.clone())
        .process_batch(vec![bounce(
            contact.address.value(),
            Some("blocked"),
            Some("5.1.1"),
        )])
        .await;
    assert_eq!(report.suppressed, 1);
    assert_eq!(report.failed, 0);

    // Address-level signal: both lists are suppressed.
    let repo = SubscriptionRepository::new(&pool);
    for list_id in list_ids {
        let sub = repo
            .get(contact.id, listkeeper_core::MailingListId::new(list_id))
            .await
            .expect("query failed")
            .expect("subscription exists");
        assert_eq!(sub.status, SubscriptionStatus::Bounced);
    }

    let contact_after = ContactRepository::new(&pool)
        .get_by_id(contact.id)
        .await
        .expect("query failed")
        .expect("contact exists");
    assert!(!contact_after.is_verified);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_soft_bounce_changes_nothing() {
    let pool = test_pool().await;
    let (contact, list_ids) = subscribed_contact(&pool, "softbounce", 1).await;

    let report = SuppressionService::new(pool.clone())
        .process_batch(vec![bounce(contact.address.value(), None, Some("4.2.2"))])
        .await;
    assert_eq!(report.suppressed, 0);
    assert_eq!(report.ignored, 1);

    let sub = SubscriptionRepository::new(&pool)
        .get(
            contact.id,
            listkeeper_core::MailingListId::new(*list_ids.first().expect("one list")),
        )
        .await
        .expect("query failed")
        .expect("subscription exists");
    assert_eq!(sub.status, SubscriptionStatus::Subscribed);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_suppression_replay_is_idempotent() {
    let pool = test_pool().await;
    let (contact, _) = subscribed_contact(&pool, "replay", 1).await;

    let event = spam_report(contact.address.value());
    let service = SuppressionService::new(pool.clone());

    let first = service.process_batch(vec![event.clone()]).await;
    assert_eq!(first.suppressed, 1);

    // Replaying the same event yields the same end state and no error.
    let second = service.process_batch(vec![event]).await;
    assert_eq!(second.failed, 0);

    let contact_after = ContactRepository::new(&pool)
        .get_by_id(contact.id)
        .await
        .expect("query failed")
        .expect("contact exists");
    assert!(!contact_after.is_verified);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_unknown_recipient_is_ignored_not_failed() {
    let pool = test_pool().await;

    let report = SuppressionService::new(pool)
        .process_batch(vec![bounce(
            &unique_email("nobody"),
            Some("blocked"),
            None,
        )])
        .await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.suppressed, 0);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_one_bad_event_does_not_abort_the_batch() {
    let pool = test_pool().await;
    let (contact, _) = subscribed_contact(&pool, "mixed", 1).await;

    let report = SuppressionService::new(pool.clone())
        .process_batch(vec![
            bounce("not-an-address", Some("blocked"), None),
            spam_report(contact.address.value()),
        ])
        .await;

    assert_eq!(report.suppressed, 1);
    assert_eq!(report.ignored, 1);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_resubscribe_after_bounce_requires_fresh_verification() {
    let pool = test_pool().await;
    let (contact, list_ids) = subscribed_contact(&pool, "revive", 1).await;
    let list_id = listkeeper_core::MailingListId::new(*list_ids.first().expect("one list"));

    SuppressionService::new(pool.clone())
        .process_batch(vec![bounce(
            contact.address.value(),
            Some("blocked"),
            None,
        )])
        .await;

    // Re-subscribe with auto_confirm requested: a bounced address still
    // restarts at pending.
    let service = SubscriptionService::new(&pool);
    let list = service
        .resolve_list(&ListSelector::Id(list_id))
        .await
        .expect("list lookup failed");
    let sub = service
        .subscribe(
            contact.id,
            &list,
            SubscribeOptions {
                auto_confirm: true,
                ..SubscribeOptions::default()
            },
        )
        .await
        .expect("resubscribe failed");

    assert_eq!(sub.status, SubscriptionStatus::Pending);
    assert!(sub.opt_in_at.is_none());
}
