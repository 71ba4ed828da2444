//! Delivery-provider API client.
//!
//! Message composition and delivery are external concerns: this client only
//! asks the provider to send the double opt-in verification message. The
//! suppression webhook on the other side of the provider is handled by
//! [`super::suppression`].

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::MailerConfig;

/// Errors that can occur when interacting with the delivery provider.
#[derive(Debug, Error)]
pub enum MailerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// Failed to build the client or parse a response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Delivery-provider API client.
#[derive(Clone)]
pub struct MailerClient {
    client: reqwest::Client,
    base_url: String,
    from_email: String,
    from_name: String,
}

impl MailerClient {
    /// Create a new delivery-provider client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &MailerConfig) -> Result<Self, MailerError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| MailerError::Parse(format!("Invalid API key format: {e}")))?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    /// Ask the provider to send a verification message.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or is rejected.
    pub async fn send_verification(
        &self,
        recipient: &str,
        list_name: &str,
        verify_url: &str,
    ) -> Result<(), MailerError> {
        let url = format!("{}/mail/send", self.base_url);

        let body = serde_json::json!({
            "personalizations": [{
                "to": [{ "email": recipient }]
            }],
            "from": {
                "email": self.from_email,
                "name": self.from_name
            },
            "subject": format!("Confirm your subscription to {list_name}"),
            "content": [{
                "type": "text/plain",
                "value": format!(
                    "Please confirm your subscription to {list_name} by visiting:\n\n\
                     {verify_url}\n\n\
                     The link is valid for 24 hours. If you did not request this, \
                     you can ignore this message."
                )
            }]
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(recipient = %recipient, "Verification message accepted by provider");
        Ok(())
    }
}
