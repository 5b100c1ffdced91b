//! Outbound delivery of alert messages.

use crate::config::NotifierConfig;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

/// Delivery failure for a single attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The endpoint answered 429 Too Many Requests.
    #[error("rate limited by notification endpoint: {body}")]
    RateLimited {
        /// Response body.
        body: String,
    },

    /// The endpoint answered with another non-2xx status.
    #[error("notification endpoint returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Classifies a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 {
            Self::RateLimited { body }
        } else {
            Self::Rejected { status, body }
        }
    }

    /// Returns true for failures that may succeed on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.to_string())
    }
}

/// Sink for rendered alert messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one message. Each call is one delivery attempt.
    async fn send(&self, message: &str) -> Result<(), DeliveryError>;
}

/// Posts alert messages as plain text to a broadcast endpoint.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    /// Creates a notifier with the configured endpoint and timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &NotifierConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_client(client, &config.endpoint))
    }

    /// Creates a notifier around an existing client.
    #[must_use]
    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// Returns the target endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, message: &str) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/plain")
            .body(message.to_string())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(DeliveryError::from_status(status.as_u16(), body))
        }
    }
}
