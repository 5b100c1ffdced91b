//! Notification dispatch: eligibility filter, bounded queue, rate-limited
//! delivery with backoff.

mod eligibility;
mod engine;
mod events;
mod queue;
mod request;

#[cfg(test)]
mod tests;

pub use eligibility::{Eligibility, EligibilityFilter};
pub use engine::{DispatcherStats, NotificationDispatcher};
pub use events::{DispatchEvent, DropReason};
pub use queue::{EnqueueResult, NotificationQueue};
pub use request::{Direction, NotificationRequest, PriceAlert, RequestOutcome};
