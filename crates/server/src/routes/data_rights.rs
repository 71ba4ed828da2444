//! Data rights route handlers (export and erasure).

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use listkeeper_core::AccountId;

use crate::error::Result;
use crate::services::data_rights::{ContactDataExport, DataRightsService};
use crate::state::AppState;

/// Erasure confirmation payload.
#[derive(Debug, Serialize)]
pub struct EraseResponse {
    /// Contacts removed (subscriptions and tokens cascade with them).
    pub deleted_contacts: u64,
}

/// Export all subscription data for an account.
#[instrument(skip(state))]
pub async fn export(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ContactDataExport>> {
    let export = DataRightsService::new(state.pool())
        .export_contact_data(AccountId::new(account_id))
        .await?;

    Ok(Json(export))
}

/// Irreversibly erase all subscription data for an account.
///
/// Returns 404 when the account owns no contacts.
#[instrument(skip(state))]
pub async fn erase(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<EraseResponse>> {
    let deleted_contacts = DataRightsService::new(state.pool())
        .delete_contact_data(AccountId::new(account_id))
        .await?;

    Ok(Json(EraseResponse { deleted_contacts }))
}
