//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LISTKEEPER_DATABASE_URL` - `PostgreSQL` connection string
//! - `LISTKEEPER_BASE_URL` - Public URL of the service (verification links)
//!
//! ## Optional
//! - `LISTKEEPER_HOST` - Bind address (default: 127.0.0.1)
//! - `LISTKEEPER_PORT` - Listen port (default: 8080)
//! - `LISTKEEPER_CONFIRM_REDIRECT_URL` - Where a successful verification
//!   click is redirected (default: `<base_url>/subscription/confirmed`)
//! - `LISTKEEPER_NEWSLETTER_SLUG` - Designated marketing list slug
//!   (default: `newsletter`)
//! - `MAILER_API_KEY` - Delivery-provider API key; the mailer is disabled
//!   when unset (verification links are logged instead)
//! - `MAILER_BASE_URL` - Provider API base (default: SendGrid v3)
//! - `MAILER_FROM_EMAIL` - Sender address (required when the mailer is on)
//! - `MAILER_FROM_NAME` - Sender display name (default: Listkeeper)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the service
    pub base_url: String,
    /// Redirect target after a successful verification click
    pub confirmation_redirect_url: String,
    /// Slug of the designated marketing newsletter list
    pub newsletter_slug: String,
    /// Delivery-provider configuration (None disables outbound mail)
    pub mailer: Option<MailerConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Delivery-provider API configuration.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Provider API key
    pub api_key: SecretString,
    /// Provider API base URL
    pub base_url: String,
    /// Sender address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require_env("LISTKEEPER_DATABASE_URL")?;
        let base_url = require_env("LISTKEEPER_BASE_URL")?;

        // Fail fast on an unusable base URL rather than emitting broken links
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("LISTKEEPER_BASE_URL".to_owned(), e.to_string())
        })?;
        let base_url = base_url.trim_end_matches('/').to_owned();

        let host: IpAddr = optional_env("LISTKEEPER_HOST")
            .unwrap_or_else(|| "127.0.0.1".to_owned())
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidEnvVar("LISTKEEPER_HOST".to_owned(), e.to_string())
            })?;

        let port: u16 = optional_env("LISTKEEPER_PORT")
            .unwrap_or_else(|| "8080".to_owned())
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidEnvVar("LISTKEEPER_PORT".to_owned(), e.to_string())
            })?;

        let confirmation_redirect_url = optional_env("LISTKEEPER_CONFIRM_REDIRECT_URL")
            .unwrap_or_else(|| default_confirmation_url(&base_url));

        let newsletter_slug =
            optional_env("LISTKEEPER_NEWSLETTER_SLUG").unwrap_or_else(|| "newsletter".to_owned());

        let mailer = match optional_env("MAILER_API_KEY") {
            Some(api_key) => Some(MailerConfig {
                api_key: SecretString::from(api_key),
                base_url: optional_env("MAILER_BASE_URL")
                    .unwrap_or_else(|| "https://api.sendgrid.com/v3".to_owned()),
                from_email: require_env("MAILER_FROM_EMAIL")?,
                from_name: optional_env("MAILER_FROM_NAME")
                    .unwrap_or_else(|| "Listkeeper".to_owned()),
            }),
            None => None,
        };

        Ok(Self {
            database_url: SecretString::from(database_url),
            host,
            port,
            base_url,
            confirmation_redirect_url,
            newsletter_slug,
            mailer,
            sentry_dsn: optional_env("SENTRY_DSN"),
            sentry_environment: optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Socket address to bind the listener to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Build the verification link for a token value.
    ///
    /// Token values are URL-safe by construction, so no encoding is needed.
    #[must_use]
    pub fn verification_url(&self, token: &str) -> String {
        format!("{}/verify?token={token}", self.base_url)
    }
}

/// Read a required environment variable.
fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_owned()))
}

/// Read an optional environment variable, treating empty as unset.
fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default confirmation page for a base URL.
fn default_confirmation_url(base_url: &str) -> String {
    format!("{base_url}/subscription/confirmed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/listkeeper"),
            host: "127.0.0.1".parse().expect("valid addr"),
            port: 8080,
            base_url: "https://lists.example.com".to_owned(),
            confirmation_redirect_url: default_confirmation_url("https://lists.example.com"),
            newsletter_slug: "newsletter".to_owned(),
            mailer: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_verification_url_embeds_token() {
        let config = test_config();
        assert_eq!(
            config.verification_url("abc123_-"),
            "https://lists.example.com/verify?token=abc123_-"
        );
    }

    #[test]
    fn test_default_confirmation_url() {
        assert_eq!(
            default_confirmation_url("https://lists.example.com"),
            "https://lists.example.com/subscription/confirmed"
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
    }
}
