//! Integration tests for export and erasure.

use listkeeper_core::{AccountId, ContactKind, SubscriptionStatus};
use listkeeper_integration_tests::{test_pool, unique_email, unique_slug};
use listkeeper_server::services::EngineError;
use listkeeper_server::services::contacts::{ContactService, LinkContactRequest};
use listkeeper_server::services::data_rights::DataRightsService;
use listkeeper_server::services::subscriptions::{ListSelector, SubscriptionService};
use listkeeper_server::services::verification::VerificationService;
use uuid::Uuid;

fn link_request(account_id: AccountId, email: &str) -> LinkContactRequest {
    LinkContactRequest {
        kind: ContactKind::Email,
        value: email.to_owned(),
        source: "account-signup".to_owned(),
        owner_account_id: account_id,
        is_primary: true,
        provider_verified: true,
        marketing_opt_in: true,
    }
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_link_auto_subscribes_and_export_nests_subscriptions() {
    let pool = test_pool().await;
    let account_id = AccountId::new(Uuid::new_v4());
    let email = unique_email("export");

    let contact = ContactService::new(&pool)
        .link_contact(&link_request(account_id, &email), &unique_slug("newsletter"))
        .await
        .expect("link failed");
    assert!(contact.is_verified, "provider verification must promote");
    assert_eq!(contact.owner_account_id, Some(account_id));

    let export = DataRightsService::new(&pool)
        .export_contact_data(account_id)
        .await
        .expect("export failed");

    assert_eq!(export.contacts.len(), 1);
    let exported = export.contacts.first().expect("one contact");
    assert_eq!(exported.value, email.to_lowercase());

    // Marketing opt-in at signup is auto-confirmed: consent was proven by
    // the identity provider.
    assert!(!exported.subscriptions.is_empty());
    for sub in &exported.subscriptions {
        assert_eq!(sub.status, SubscriptionStatus::Subscribed);
        assert!(sub.opt_in_at.is_some());
    }
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_erasure_cascades_and_empties_the_export() {
    let pool = test_pool().await;
    let account_id = AccountId::new(Uuid::new_v4());
    let email = unique_email("erase");
    let newsletter = unique_slug("newsletter");

    let contact = ContactService::new(&pool)
        .link_contact(&link_request(account_id, &email), &newsletter)
        .await
        .expect("link failed");

    // Leave a pending token behind so the cascade has something to chew on.
    let extra_list = SubscriptionService::new(&pool)
        .resolve_list(&ListSelector::Slug(unique_slug("extra")))
        .await
        .expect("list creation failed");
    SubscriptionService::new(&pool)
        .subscribe(contact.id, &extra_list, Default::default())
        .await
        .expect("subscribe failed");
    VerificationService::new(&pool)
        .issue_token(contact.id, extra_list.id)
        .await
        .expect("token issuance failed");

    let deleted = DataRightsService::new(&pool)
        .delete_contact_data(account_id)
        .await
        .expect("erasure failed");
    assert_eq!(deleted, 1);

    // Cascade removed the dependent rows.
    let orphan_subscriptions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM listkeeper.contact_subscription WHERE contact_id = $1",
    )
    .bind(contact.id)
    .fetch_one(&pool)
    .await
    .expect("count failed");
    assert_eq!(orphan_subscriptions, 0);

    let orphan_tokens: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM listkeeper.verification_token WHERE contact_id = $1",
    )
    .bind(contact.id)
    .fetch_one(&pool)
    .await
    .expect("count failed");
    assert_eq!(orphan_tokens, 0);

    // The export is now empty, and a second erasure has nothing to delete.
    let export = DataRightsService::new(&pool)
        .export_contact_data(account_id)
        .await
        .expect("export failed");
    assert!(export.contacts.is_empty());

    let err = DataRightsService::new(&pool)
        .delete_contact_data(account_id)
        .await
        .expect_err("second erasure");
    assert!(matches!(err, EngineError::NotFound(_)));
}
