//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::mailer::{MailerClient, MailerError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the database pool and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    mailer: Option<MailerClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The mailer client is built only when the configuration carries
    /// delivery-provider credentials; without it, verification links are
    /// logged instead of sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailer client fails to build.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, MailerError> {
        let mailer = config.mailer.as_ref().map(MailerClient::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                mailer,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the delivery-provider client, if configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&MailerClient> {
        self.inner.mailer.as_ref()
    }
}
