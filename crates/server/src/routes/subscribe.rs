//! Signup route handler.
//!
//! Accepts `{ email, mailing_list_id | slug }`, creates or reuses the guest
//! contact, puts the subscription into `pending`, and issues a verification
//! token. The token is handed to the delivery provider; when no provider is
//! configured the link is logged instead, which keeps local development and
//! tests self-contained.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use listkeeper_core::{ContactAddress, ContactId, Email, MailingListId};

use crate::error::Result;
use crate::services::EngineError;
use crate::services::contacts::ContactService;
use crate::services::subscriptions::{ListSelector, SubscribeOptions, SubscriptionService};
use crate::services::verification::VerificationService;
use crate::state::AppState;

/// Provenance tag for contacts created through this endpoint.
const SIGNUP_SOURCE: &str = "signup-form";

/// Signup request payload.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Address to subscribe.
    pub email: String,
    /// Target list by ID.
    #[serde(default)]
    pub mailing_list_id: Option<i32>,
    /// Target list by slug (created lazily if absent).
    #[serde(default)]
    pub slug: Option<String>,
}

/// Signup confirmation payload.
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    /// Always `pending_verification` for this endpoint.
    pub status: &'static str,
    /// The contact the subscription belongs to.
    pub contact_id: ContactId,
    /// The list subscribed to.
    pub mailing_list_id: MailingListId,
    /// Slug of the list subscribed to.
    pub mailing_list_slug: String,
}

/// Start a double opt-in signup.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>> {
    let email = Email::parse(&req.email)
        .map_err(|e| EngineError::Validation(format!("invalid email: {e}")))?;
    let address = ContactAddress::Email(email);

    let selector = match (req.mailing_list_id, req.slug) {
        (Some(id), _) => ListSelector::Id(MailingListId::new(id)),
        (None, Some(slug)) => ListSelector::Slug(slug),
        (None, None) => {
            return Err(EngineError::Validation(
                "either mailing_list_id or slug is required".to_owned(),
            )
            .into());
        }
    };

    let pool = state.pool();

    let contact = ContactService::new(pool)
        .get_or_create_guest(&address, SIGNUP_SOURCE)
        .await?;

    let subscription_service = SubscriptionService::new(pool);
    let list = subscription_service.resolve_list(&selector).await?;
    let subscription = subscription_service
        .subscribe(contact.id, &list, SubscribeOptions::default())
        .await?;

    let token = VerificationService::new(pool)
        .issue_token(contact.id, list.id)
        .await?;
    let verify_url = state.config().verification_url(&token.token);

    match state.mailer() {
        Some(mailer) => {
            // Delivery failure is the provider's concern; the signup itself
            // has succeeded and the contact can request a resend.
            if let Err(e) = mailer
                .send_verification(contact.address.value(), &list.name, &verify_url)
                .await
            {
                tracing::warn!(
                    contact_id = %contact.id,
                    error = %e,
                    "Failed to hand verification message to provider"
                );
            }
        }
        None => {
            tracing::info!(
                contact_id = %contact.id,
                verify_url = %verify_url,
                "No mailer configured, verification link logged"
            );
        }
    }

    Ok(Json(SubscribeResponse {
        status: "pending_verification",
        contact_id: contact.id,
        mailing_list_id: subscription.mailing_list_id,
        mailing_list_slug: list.slug,
    }))
}
