//! Request and response models for the REST API.

use crate::audit::AuditRecord;
use crate::dispatcher::{Direction, PriceAlert, RequestOutcome};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Request to submit a price alert.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateNotificationRequest {
    /// Trading symbol (e.g., "BTCUSDT").
    pub subject: String,
    /// Direction of the move.
    pub direction: Direction,
    /// Percentage change that triggered the alert.
    pub magnitude_percent: f64,
    /// Label of the originating view.
    pub context_label: String,
    /// Monetary impact of the move in dollars.
    pub impact_amount: f64,
    /// Owner of the alert.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl CreateNotificationRequest {
    /// Validates the request and converts it into a dispatcher alert.
    ///
    /// # Errors
    /// Returns `ApiError::InvalidRequest` on an empty subject or a
    /// non-finite number.
    pub fn into_alert(self) -> Result<PriceAlert, ApiError> {
        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(ApiError::InvalidRequest(
                "subject must not be empty".to_string(),
            ));
        }
        if !self.magnitude_percent.is_finite() {
            return Err(ApiError::InvalidRequest(
                "magnitude_percent must be a finite number".to_string(),
            ));
        }
        if !self.impact_amount.is_finite() {
            return Err(ApiError::InvalidRequest(
                "impact_amount must be a finite number".to_string(),
            ));
        }

        let alert = PriceAlert::new(
            subject,
            self.direction,
            self.magnitude_percent,
            self.context_label,
            self.impact_amount,
        );
        Ok(match self.user_id {
            Some(user_id) => alert.with_user(user_id),
            None => alert,
        })
    }
}

/// Response to an alert submission.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateNotificationResponse {
    /// What the dispatcher did with the alert. Never reports delivery.
    pub outcome: RequestOutcome,
}

/// List of audit records.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListResponse {
    /// Records, newest first.
    pub notifications: Vec<AuditRecord>,
    /// Number of records returned.
    pub count: usize,
}
