//! Delivery-provider webhook route handler.
//!
//! The provider posts batches of delivery-feedback events. The endpoint
//! returns 200 whenever the payload parses, regardless of whether any
//! contact matched: unknown recipients are no-ops by design, and replaying
//! a batch is idempotent.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::services::suppression::{BatchReport, DeliveryEvent, SuppressionService};
use crate::state::AppState;

/// Consume a batch of bounce / complaint events.
#[instrument(skip(state, events), fields(batch_size = events.len()))]
pub async fn email_events(
    State(state): State<AppState>,
    Json(events): Json<Vec<DeliveryEvent>>,
) -> Json<BatchReport> {
    let report = SuppressionService::new(state.pool().clone())
        .process_batch(events)
        .await;

    Json(report)
}
