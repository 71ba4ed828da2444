//! Verification route handler.
//!
//! The link from the verification message lands here. On success the click
//! is redirected to the configured confirmation page; failures return 4xx
//! JSON with distinct machine codes (`missing_token`, `invalid_token`,
//! `expired_token`, `already_used`) so the UI can offer "resend" only when
//! that can still help.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::verification::VerificationService;
use crate::state::AppState;

/// Verification link query parameters.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    /// The token from the verification message.
    #[serde(default)]
    pub token: Option<String>,
}

/// Confirm a pending subscription via its token.
#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let token = params
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or(AppError::MissingToken)?;

    let ip = client_ip(&headers);
    let user_agent = header_value(&headers, "user-agent");

    let (contact, subscription) = VerificationService::new(state.pool())
        .consume_token(&token, ip.as_deref(), user_agent.as_deref())
        .await?;

    tracing::info!(
        contact_id = %contact.id,
        mailing_list_id = %subscription.mailing_list_id,
        "Subscription verified"
    );

    Ok(Redirect::to(&state.config().confirmation_redirect_url))
}

/// First client IP from `X-Forwarded-For`, if present and parseable.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| s.parse::<std::net::IpAddr>().is_ok())
        .map(str::to_owned)
}

/// A header as an owned string, if present and valid UTF-8.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
