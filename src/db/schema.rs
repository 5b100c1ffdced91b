//! Row mapping for the `price_alert_notifications` table.

use crate::audit::{AuditRecord, AuditStatus};
use crate::dispatcher::Direction;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Raw row of `price_alert_notifications`.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    /// Record identifier.
    pub id: Uuid,
    /// Owner of the alert.
    pub user_id: Option<String>,
    /// Trading symbol.
    pub subject: String,
    /// "UP" or "DOWN".
    pub direction: String,
    /// Percentage change.
    pub magnitude_percent: f64,
    /// Originating view label.
    pub context_label: String,
    /// Monetary impact in dollars.
    pub impact_amount: f64,
    /// Rendered message.
    pub message: String,
    /// "pending", "sent" or "failed".
    pub status: String,
    /// Error detail of the last failed attempt.
    pub error_message: Option<String>,
    /// Delivery attempts made so far.
    pub attempts: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Successful delivery time.
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for AuditRecord {
    fn from(row: NotificationRow) -> Self {
        // Rows are only written by this service; fall back on the sign otherwise.
        let direction = Direction::from_str_value(&row.direction).unwrap_or(
            if row.magnitude_percent < 0.0 {
                Direction::Down
            } else {
                Direction::Up
            },
        );

        Self {
            id: row.id,
            user_id: row.user_id,
            subject: row.subject,
            direction,
            magnitude_percent: row.magnitude_percent,
            context_label: row.context_label,
            impact_amount: row.impact_amount,
            message: row.message,
            status: AuditStatus::from_str_value(&row.status),
            error_message: row.error_message,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            sent_at: row.sent_at,
        }
    }
}
