//! Unsubscribe route handler.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use listkeeper_core::{ContactId, MailingListId, SubscriptionStatus};

use crate::error::Result;
use crate::services::subscriptions::SubscriptionService;
use crate::state::AppState;

/// Unsubscribe request payload.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    /// The contact opting out.
    pub contact_id: i32,
    /// The list to opt out of.
    pub mailing_list_id: i32,
    /// Optional free-text reason, recorded in the subscription metadata.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Unsubscribe confirmation payload.
#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    /// State after the call (`unsubscribed`, or `bounced` when suppression
    /// already won).
    pub status: SubscriptionStatus,
    /// When the contact opted out.
    pub opt_out_at: Option<DateTime<Utc>>,
}

/// Opt a contact out of a list.
///
/// Returns 404 when no subscription exists for the pair; repeating the call
/// on an already-unsubscribed row is a 200 no-op.
#[instrument(skip(state, req), fields(contact_id = req.contact_id, mailing_list_id = req.mailing_list_id))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>> {
    let subscription = SubscriptionService::new(state.pool())
        .unsubscribe(
            ContactId::new(req.contact_id),
            MailingListId::new(req.mailing_list_id),
            req.reason.as_deref(),
        )
        .await?;

    Ok(Json(UnsubscribeResponse {
        status: subscription.status,
        opt_out_at: subscription.opt_out_at,
    }))
}
