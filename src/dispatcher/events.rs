//! Events broadcast by the dispatcher.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Why a queued or eligible request will never be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Queue full of larger moves.
    QueueFull,
    /// Displaced by a larger move.
    Evicted,
    /// Waited in the queue too long.
    Stale,
}

/// Lifecycle events of dispatched notifications.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// Request entered the queue.
    Queued {
        /// Request identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Percentage change.
        magnitude_percent: f64,
        /// Queue length after insertion.
        queue_len: usize,
    },
    /// Request left the queue without being sent.
    Dropped {
        /// Request identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Why it was dropped.
        reason: DropReason,
    },
    /// Delivery attempt succeeded.
    Sent {
        /// Request identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Attempt number, starting at 0.
        attempt: u32,
    },
    /// Delivery attempt failed.
    Failed {
        /// Request identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Attempt number, starting at 0.
        attempt: u32,
        /// Failure detail.
        error: String,
    },
    /// Another attempt is scheduled.
    RetryScheduled {
        /// Request identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Attempt number of the retry.
        attempt: u32,
        /// Delay before the retry in seconds.
        delay_secs: u64,
    },
    /// No further attempts will be made.
    GaveUp {
        /// Request identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Total attempts made.
        attempts: u32,
    },
}

impl DispatchEvent {
    /// Trading symbol the event refers to.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Queued { subject, .. }
            | Self::Dropped { subject, .. }
            | Self::Sent { subject, .. }
            | Self::Failed { subject, .. }
            | Self::RetryScheduled { subject, .. }
            | Self::GaveUp { subject, .. } => subject,
        }
    }
}
