//! Integration tests for the subscription lifecycle.
//!
//! These tests require a migrated `PostgreSQL` database:
//!
//! ```bash
//! cargo run -p listkeeper-cli -- migrate
//! cargo test -p listkeeper-integration-tests -- --ignored
//! ```

use listkeeper_core::{ContactAddress, ContactKind, Email, SubscriptionStatus};
use listkeeper_integration_tests::{expire_token, latest_token_value, test_pool, unique_email, unique_slug};
use listkeeper_server::models::{Contact, MailingList};
use listkeeper_server::services::EngineError;
use listkeeper_server::services::contacts::{ContactService, CreateContactRequest};
use listkeeper_server::services::subscriptions::{
    ListSelector, SubscribeOptions, SubscriptionService,
};
use listkeeper_server::services::verification::VerificationService;
use sqlx::PgPool;

/// Create a fresh guest contact and lazily created list for one test.
async fn fresh_contact_and_list(pool: &PgPool, prefix: &str) -> (Contact, MailingList) {
    let email = Email::parse(&unique_email(prefix)).expect("valid test email");
    let contact = ContactService::new(pool)
        .get_or_create_guest(&ContactAddress::Email(email), "integration-test")
        .await
        .expect("contact creation failed");

    let list = SubscriptionService::new(pool)
        .resolve_list(&ListSelector::Slug(unique_slug(prefix)))
        .await
        .expect("list creation failed");

    (contact, list)
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_duplicate_contact_conflicts_on_normalized_value() {
    let pool = test_pool().await;
    let raw = unique_email("dup");

    let service = ContactService::new(&pool);
    let first = CreateContactRequest {
        kind: ContactKind::Email,
        value: raw.clone(),
        source: "integration-test".to_owned(),
        owner_account_id: None,
        is_primary: false,
    };
    service.create_contact(&first).await.expect("first create");

    // Same address, different case: normalization must hit the same row.
    let second = CreateContactRequest {
        value: raw.to_uppercase(),
        ..first
    };
    let err = service.create_contact(&second).await.expect_err("duplicate");
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_signup_verify_unsubscribe_resubscribe() {
    let pool = test_pool().await;
    let (contact, list) = fresh_contact_and_list(&pool, "lifecycle").await;

    let subscriptions = SubscriptionService::new(&pool);
    let verification = VerificationService::new(&pool);

    // Signup: pending, no consent timestamp yet.
    let sub = subscriptions
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await
        .expect("subscribe failed");
    assert_eq!(sub.status, SubscriptionStatus::Pending);
    assert!(sub.opt_in_at.is_none());

    // Verify with a fresh token.
    let token = verification
        .issue_token(contact.id, list.id)
        .await
        .expect("token issuance failed");
    let (verified_contact, confirmed) = verification
        .consume_token(&token.token, Some("203.0.113.7"), Some("integration-test/1.0"))
        .await
        .expect("consume failed");

    assert!(verified_contact.is_verified);
    assert!(verified_contact.verified_at.is_some());
    assert_eq!(confirmed.status, SubscriptionStatus::Subscribed);
    let first_opt_in = confirmed.opt_in_at.expect("opt_in_at set on confirm");
    assert_eq!(confirmed.opt_in_ip.as_deref(), Some("203.0.113.7"));

    // Unsubscribe: opt_out_at set, consent history preserved.
    let unsubscribed = subscriptions
        .unsubscribe(contact.id, list.id, Some("too many emails"))
        .await
        .expect("unsubscribe failed");
    assert_eq!(unsubscribed.status, SubscriptionStatus::Unsubscribed);
    assert!(unsubscribed.opt_out_at.is_some());
    assert_eq!(unsubscribed.opt_in_at, Some(first_opt_in));

    // Resubscribe: back to pending, consent timestamp refreshed (cleared
    // until the new confirmation), prior opt-out still visible.
    let resubscribed = subscriptions
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await
        .expect("resubscribe failed");
    assert_eq!(resubscribed.status, SubscriptionStatus::Pending);
    assert!(resubscribed.opt_in_at.is_none());
    assert!(resubscribed.opt_out_at.is_some());
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_subscribe_twice_conflicts_when_subscribed() {
    let pool = test_pool().await;
    let (contact, list) = fresh_contact_and_list(&pool, "twice").await;

    let subscriptions = SubscriptionService::new(&pool);
    subscriptions
        .subscribe(
            contact.id,
            &list,
            SubscribeOptions {
                auto_confirm: true,
                ..SubscribeOptions::default()
            },
        )
        .await
        .expect("auto-confirm subscribe failed");

    let err = subscriptions
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await
        .expect_err("second subscribe on a subscribed row");
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_token_issuance_rate_limit() {
    let pool = test_pool().await;
    let (contact, list) = fresh_contact_and_list(&pool, "ratelimit").await;

    SubscriptionService::new(&pool)
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await
        .expect("subscribe failed");

    let verification = VerificationService::new(&pool);
    for _ in 0..3 {
        verification
            .issue_token(contact.id, list.id)
            .await
            .expect("token within the limit");
    }

    let err = verification
        .issue_token(contact.id, list.id)
        .await
        .expect_err("4th token within a minute");
    assert!(matches!(err, EngineError::RateLimited));
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_consume_token_is_exactly_once_under_concurrency() {
    let pool = test_pool().await;
    let (contact, list) = fresh_contact_and_list(&pool, "race").await;

    SubscriptionService::new(&pool)
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await
        .expect("subscribe failed");
    let token = VerificationService::new(&pool)
        .issue_token(contact.id, list.id)
        .await
        .expect("token issuance failed");

    let pool_a = pool.clone();
    let pool_b = pool.clone();
    let value_a = token.token.clone();
    let value_b = token.token.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move {
            VerificationService::new(&pool_a)
                .consume_token(&value_a, None, None)
                .await
        }),
        tokio::spawn(async move {
            VerificationService::new(&pool_b)
                .consume_token(&value_b, None, None)
                .await
        }),
    );
    let results = [a.expect("task a"), b.expect("task b")];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already_used = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::TokenAlreadyUsed)))
        .count();
    assert_eq!(successes, 1, "exactly one concurrent consume must win");
    assert_eq!(already_used, 1, "the loser must observe AlreadyUsed");
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_consume_token_replay_fails_and_leaves_state() {
    let pool = test_pool().await;
    let (contact, list) = fresh_contact_and_list(&pool, "replay").await;

    SubscriptionService::new(&pool)
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await
        .expect("subscribe failed");

    let verification = VerificationService::new(&pool);
    let token = verification
        .issue_token(contact.id, list.id)
        .await
        .expect("token issuance failed");

    verification
        .consume_token(&token.token, None, None)
        .await
        .expect("first consume");

    let err = verification
        .consume_token(&token.token, None, None)
        .await
        .expect_err("replay");
    assert!(matches!(err, EngineError::TokenAlreadyUsed));

    // State unchanged by the replay.
    let sub = listkeeper_server::db::SubscriptionRepository::new(&pool)
        .get(contact.id, list.id)
        .await
        .expect("query failed")
        .expect("subscription exists");
    assert_eq!(sub.status, SubscriptionStatus::Subscribed);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_expired_token_fails_without_partial_updates() {
    let pool = test_pool().await;
    let (contact, list) = fresh_contact_and_list(&pool, "expired").await;

    SubscriptionService::new(&pool)
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await
        .expect("subscribe failed");

    let verification = VerificationService::new(&pool);
    verification
        .issue_token(contact.id, list.id)
        .await
        .expect("token issuance failed");
    let value = latest_token_value(&pool, contact.id).await;
    expire_token(&pool, &value).await;

    let err = verification
        .consume_token(&value, None, None)
        .await
        .expect_err("expired token");
    assert!(matches!(err, EngineError::TokenExpired));

    // Neither the contact nor the subscription moved.
    let contact_after = listkeeper_server::db::ContactRepository::new(&pool)
        .get_by_id(contact.id)
        .await
        .expect("query failed")
        .expect("contact exists");
    assert!(!contact_after.is_verified);

    let sub = listkeeper_server::db::SubscriptionRepository::new(&pool)
        .get(contact.id, list.id)
        .await
        .expect("query failed")
        .expect("subscription exists");
    assert_eq!(sub.status, SubscriptionStatus::Pending);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_unknown_token_is_invalid() {
    let pool = test_pool().await;

    let err = VerificationService::new(&pool)
        .consume_token(&"A".repeat(43), None, None)
        .await
        .expect_err("unknown token");
    assert!(matches!(err, EngineError::TokenInvalid));
}
