//! HTTP client for the Price Alert API.

use crate::error::Error;
use crate::types::*;
use reqwest::Client;
use std::time::Duration;


/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., "http://localhost:8080").
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the Price Alert API.
#[derive(Debug, Clone)]
pub struct AlertClient {
    client: Client,
    base_url: String,
}

impl AlertClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a new client with default timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        Self::new(ClientConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Performs a health check.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn health_check(&self) -> Result<HealthResponse, Error> {
        let url = format!("{}/health", self.base_url);
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Submits a price alert.
    ///
    /// The response only says whether the alert was queued; delivery is
    /// observable through [`Self::list_notifications`] or the event feed.
    ///
    /// # Errors
    /// Returns error if the request fails or the alert is invalid.
    pub async fn request_notification(
        &self,
        request: &NotificationRequest,
    ) -> Result<NotificationResponse, Error> {
        let url = format!("{}/api/v1/notifications", self.base_url);
        let resp = self.client.post(&url).json(request).send().await?;
        self.handle_response(resp).await
    }

    /// Lists recent audit records.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_notifications(
        &self,
        query: Option<&NotificationQuery>,
    ) -> Result<NotificationListResponse, Error> {
        let mut url = format!("{}/api/v1/notifications", self.base_url);
        if let Some(q) = query {
            let params = serde_urlencoded::to_string(q)?;
            if !params.is_empty() {
                url.push('?');
                url.push_str(&params);
            }
        }
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    /// Gets the dispatcher snapshot.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_stats(&self) -> Result<DispatcherStats, Error> {
        let url = format!("{}/api/v1/notifications/stats", self.base_url);
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    // ========================================================================
    // WebSocket
    // ========================================================================

    /// Returns the WebSocket URL for this client.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let ws_base = self
            .base_url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        format!("{}/ws", ws_base)
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let text = resp.text().await.unwrap_or_default();
        match status.as_u16() {
            400 => Err(Error::InvalidRequest(text)),
            404 => Err(Error::NotFound(text)),
            code => Err(Error::Api {
                status: code,
                message: text,
            }),
        }
    }
}
