//! Request and response types for the Price Alert API.

use serde::{Deserialize, Serialize};


/// Direction of a price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Price went up.
    Up,
    /// Price went down.
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// What the dispatcher did with a submitted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Magnitude below the notification threshold.
    BelowThreshold,
    /// Subject still cooling down.
    Suppressed,
    /// Queued for delivery.
    Queued,
    /// Queued, displacing a smaller move.
    Replaced,
    /// Queue full of larger moves.
    Dropped,
}

/// Audit record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// Not yet delivered.
    Pending,
    /// Delivered.
    Sent,
    /// Last attempt failed.
    Failed,
}

/// Why an alert will never be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Queue full of larger moves.
    QueueFull,
    /// Displaced by a larger move.
    Evicted,
    /// Waited in the queue too long.
    Stale,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Price alert submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Trading symbol.
    pub subject: String,
    /// Direction of the move.
    pub direction: Direction,
    /// Percentage change.
    pub magnitude_percent: f64,
    /// Label of the originating view.
    pub context_label: String,
    /// Monetary impact in dollars.
    pub impact_amount: f64,
    /// Owner of the alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl NotificationRequest {
    /// Creates an alert without an owner.
    #[must_use]
    pub fn new(
        subject: &str,
        direction: Direction,
        magnitude_percent: f64,
        context_label: &str,
        impact_amount: f64,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            direction,
            magnitude_percent,
            context_label: context_label.to_string(),
            impact_amount,
            user_id: None,
        }
    }
}

/// Response to an alert submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    /// Eligibility and queueing decision.
    pub outcome: RequestOutcome,
}

/// One notification's audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Record identifier.
    pub id: String,
    /// Owner of the alert.
    pub user_id: Option<String>,
    /// Trading symbol.
    pub subject: String,
    /// Direction of the move.
    pub direction: Direction,
    /// Percentage change.
    pub magnitude_percent: f64,
    /// Label of the originating view.
    pub context_label: String,
    /// Monetary impact in dollars.
    pub impact_amount: f64,
    /// Rendered message.
    pub message: String,
    /// Current status.
    pub status: NotificationStatus,
    /// Error detail of the last failed attempt.
    pub error_message: Option<String>,
    /// Delivery attempts made.
    pub attempts: u32,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Last update time (RFC 3339).
    pub updated_at: String,
    /// Delivery time (RFC 3339).
    pub sent_at: Option<String>,
}

/// List of audit records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationListResponse {
    /// Records, newest first.
    pub notifications: Vec<NotificationRecord>,
    /// Number of records returned.
    pub count: usize,
}

/// Filters for listing audit records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// Maximum number of records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Only this subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Only this status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NotificationStatus>,
}

/// Dispatcher snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Requests waiting in the queue.
    pub queue_len: usize,
    /// Queue capacity.
    pub queue_capacity: usize,
    /// Whether a dispatch pass is running.
    pub is_processing: bool,
    /// Seconds since the last initial send.
    pub seconds_since_last_send: Option<u64>,
    /// Subjects with a cooldown stamp.
    pub tracked_subjects: usize,
    /// Requests that entered the queue.
    pub queued: u64,
    /// Eligible requests that will never be sent.
    pub dropped: u64,
    /// Successful delivery attempts.
    pub sent: u64,
    /// Failed delivery attempts.
    pub failed: u64,
    /// Retries scheduled.
    pub retries: u64,
    /// Requests abandoned after their last attempt.
    pub gave_up: u64,
}
