//! HTTP route handlers for the subscription engine.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness check
//!
//! # Subscription lifecycle
//! POST   /subscribe                       - Start a double opt-in signup
//! GET    /verify?token=...                - Confirm a pending subscription
//! POST   /unsubscribe                     - Opt out of a list
//!
//! # Delivery-provider feedback
//! POST   /webhooks/email-events           - Bounce / complaint event batch
//!
//! # Data rights
//! GET    /data-rights/export/{account_id} - Export subscription data
//! DELETE /data-rights/{account_id}        - Erase subscription data
//! ```

pub mod data_rights;
pub mod health;
pub mod subscribe;
pub mod unsubscribe;
pub mod verify;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::middleware::{api_rate_limiter, subscribe_rate_limiter};
use crate::state::AppState;

/// Create the public subscription lifecycle routes.
///
/// The signup endpoint carries the strict limiter; verification and
/// unsubscribe share the relaxed one.
pub fn subscription_routes() -> Router<AppState> {
    let signup = Router::new()
        .route("/subscribe", post(subscribe::subscribe))
        .layer(subscribe_rate_limiter());

    let lifecycle = Router::new()
        .route("/verify", get(verify::verify))
        .route("/unsubscribe", post(unsubscribe::unsubscribe))
        .layer(api_rate_limiter());

    signup.merge(lifecycle)
}

/// Create the delivery-provider webhook routes.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/email-events", post(webhooks::email_events))
}

/// Create the data rights routes.
pub fn data_rights_routes() -> Router<AppState> {
    Router::new()
        .route("/export/{account_id}", get(data_rights::export))
        .route("/{account_id}", delete(data_rights::erase))
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(subscription_routes())
        .nest("/webhooks", webhook_routes())
        .nest("/data-rights", data_rights_routes())
}
