//! Bounded priority queue of pending notifications.

use crate::dispatcher::request::NotificationRequest;
use std::time::Duration;
use tokio::time::Instant;

/// Result of offering a request to a bounded queue.
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// Appended; the queue had room.
    Accepted,
    /// Took the slot of the smallest queued move.
    Replaced {
        /// The request that lost its slot.
        evicted: NotificationRequest,
    },
    /// Queue full of moves at least as large; the request was discarded.
    Rejected,
}

/// Pending notifications, capped at a fixed capacity.
///
/// Ordering is lazy: entries sit in arrival order and are only sorted when
/// the highest-priority one is taken. Scans are linear, which is fine at
/// the sizes this is configured for.
#[derive(Debug)]
pub struct NotificationQueue {
    entries: Vec<NotificationRequest>,
    capacity: usize,
}

impl NotificationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of queued requests.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Offers a request to the queue.
    pub fn push(&mut self, request: NotificationRequest) -> EnqueueResult {
        if self.entries.len() < self.capacity {
            self.entries.push(request);
            return EnqueueResult::Accepted;
        }

        let lowest = self
            .entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.priority().total_cmp(&b.priority()))
            .map(|(idx, _)| idx);

        match lowest {
            Some(idx) if request.priority() > self.entries[idx].priority() => {
                let evicted = std::mem::replace(&mut self.entries[idx], request);
                EnqueueResult::Replaced { evicted }
            }
            _ => EnqueueResult::Rejected,
        }
    }

    /// Removes and returns the request with the largest absolute magnitude.
    pub fn pop_highest(&mut self) -> Option<NotificationRequest> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries
            .sort_by(|a, b| b.priority().total_cmp(&a.priority()));
        Some(self.entries.remove(0))
    }

    /// Drops requests that have waited at least `max_age`, returning them.
    pub fn prune_stale(&mut self, now: Instant, max_age: Duration) -> Vec<NotificationRequest> {
        let (stale, fresh): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|r| now.saturating_duration_since(r.enqueued_at) >= max_age);
        self.entries = fresh;
        stale
    }

    /// Iterates over queued requests in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &NotificationRequest> {
        self.entries.iter()
    }
}
