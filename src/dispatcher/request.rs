//! Alert requests flowing through the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

/// Direction of the price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Price went up.
    Up,
    /// Price went down.
    Down,
}

impl Direction {
    /// Parse from string, case-insensitive.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Some(Self::Up),
            "DOWN" => Some(Self::Down),
            _ => None,
        }
    }

    /// Convert to string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price alert as submitted by dashboard code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceAlert {
    /// Trading symbol the alert is about (e.g., "BTCUSDT").
    pub subject: String,
    /// Direction of the move.
    pub direction: Direction,
    /// Percentage change that triggered the alert.
    pub magnitude_percent: f64,
    /// Label of the originating view.
    pub context_label: String,
    /// Monetary impact of the move in dollars.
    pub impact_amount: f64,
    /// Owner of the alert, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl PriceAlert {
    /// Creates an alert without an owner.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        direction: Direction,
        magnitude_percent: f64,
        context_label: impl Into<String>,
        impact_amount: f64,
    ) -> Self {
        Self {
            subject: subject.into(),
            direction,
            magnitude_percent,
            context_label: context_label.into(),
            impact_amount,
            user_id: None,
        }
    }

    /// Sets the owner of the alert.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// An eligible alert, audited and waiting for delivery.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    /// Identifier shared with the audit record.
    pub id: Uuid,
    /// Owner of the alert.
    pub user_id: Option<String>,
    /// Trading symbol.
    pub subject: String,
    /// Direction of the move.
    pub direction: Direction,
    /// Percentage change.
    pub magnitude_percent: f64,
    /// Originating view label.
    pub context_label: String,
    /// Monetary impact in dollars.
    pub impact_amount: f64,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Monotonic creation time, used for staleness.
    pub enqueued_at: Instant,
}

impl NotificationRequest {
    /// Builds a request from an accepted alert.
    #[must_use]
    pub fn from_alert(alert: PriceAlert, enqueued_at: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: alert.user_id,
            subject: alert.subject,
            direction: alert.direction,
            magnitude_percent: alert.magnitude_percent,
            context_label: alert.context_label,
            impact_amount: alert.impact_amount,
            created_at: Utc::now(),
            enqueued_at,
        }
    }

    /// Queue priority: absolute magnitude of the move.
    #[must_use]
    pub fn priority(&self) -> f64 {
        self.magnitude_percent.abs()
    }

    /// Renders the plain-text message posted to the notification endpoint.
    #[must_use]
    pub fn message(&self) -> String {
        let outcome = match self.direction {
            Direction::Up => "made",
            Direction::Down => "LOST",
        };
        format!(
            "ALERT {} went {} {:.2}% your {} would have {} you ${:.2}",
            self.subject,
            self.direction,
            self.magnitude_percent,
            self.context_label,
            outcome,
            self.impact_amount.abs()
        )
    }
}

/// What happened to a submitted alert.
///
/// Only describes the eligibility and queueing decision; delivery happens
/// later and is never reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Magnitude below the notification threshold.
    BelowThreshold,
    /// Subject is still cooling down from a recent alert.
    Suppressed,
    /// Queued for delivery.
    Queued,
    /// Queued, displacing a smaller move.
    Replaced,
    /// Queue full of larger moves; audited but dropped.
    Dropped,
}

impl RequestOutcome {
    /// Returns true if the alert passed the eligibility filter.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Self::BelowThreshold | Self::Suppressed)
    }
}
