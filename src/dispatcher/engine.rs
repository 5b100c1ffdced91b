//! Rate-limited notification dispatcher.

use crate::audit::AuditSink;
use crate::config::DispatcherConfig;
use crate::dispatcher::eligibility::{Eligibility, EligibilityFilter};
use crate::dispatcher::events::{DispatchEvent, DropReason};
use crate::dispatcher::queue::{EnqueueResult, NotificationQueue};
use crate::dispatcher::request::{NotificationRequest, PriceAlert, RequestOutcome};
use crate::notifier::{DeliveryError, Notifier};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Point-in-time view of the dispatcher.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispatcherStats {
    /// Requests waiting in the queue.
    pub queue_len: usize,
    /// Queue capacity.
    pub queue_capacity: usize,
    /// Whether a dispatch pass is running.
    pub is_processing: bool,
    /// Seconds since the last initial send, if any.
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
    /// Requests abandoned after their last failed attempt.
    pub gave_up: u64,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    queued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    gave_up: AtomicU64,
}

/// Mutable state, all behind one lock.
#[derive(Debug)]
struct DispatchState {
    filter: EligibilityFilter,
    queue: NotificationQueue,
    last_sent_at: Option<Instant>,
    is_processing: bool,
    wake_armed: bool,
}

struct Inner {
    config: DispatcherConfig,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    state: Mutex<DispatchState>,
    counters: DispatchCounters,
    event_tx: broadcast::Sender<DispatchEvent>,
}

/// Best-effort, rate-limited delivery of price alerts.
///
/// At most one initial send happens per rate-limit window across all
/// subjects; the largest queued move goes first. Failed sends are retried
/// with exponential backoff outside the window. Queue and cooldown state
/// are process-local and lost on restart. Queued requests and scheduled
/// retries cannot be cancelled.
#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<Inner>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher.
    ///
    /// # Arguments
    /// * `config` - Dispatcher tunables
    /// * `notifier` - Outbound delivery channel
    /// * `audit` - Audit sink for lifecycle records
    #[must_use]
    pub fn new(
        config: DispatcherConfig,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = DispatchState {
            filter: EligibilityFilter::from_config(&config),
            queue: NotificationQueue::new(config.max_queue_size),
            last_sent_at: None,
            is_processing: false,
            wake_armed: false,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                notifier,
                audit,
                state: Mutex::new(state),
                counters: DispatchCounters::default(),
                event_tx,
            }),
        }
    }

    /// Returns the dispatcher tunables.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Returns a receiver for dispatch events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Number of queued requests.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Returns a snapshot of queue state and counters.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        let (queue_len, queue_capacity, is_processing, last_sent_at, tracked_subjects) = {
            let state = self.inner.state.lock();
            (
                state.queue.len(),
                state.queue.capacity(),
                state.is_processing,
                state.last_sent_at,
                state.filter.tracked_subjects(),
            )
        };
        let counters = &self.inner.counters;

        DispatcherStats {
            queue_len,
            queue_capacity,
            is_processing,
            seconds_since_last_send: last_sent_at.map(|t| t.elapsed().as_secs()),
            tracked_subjects,
            queued: counters.queued.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            sent: counters.sent.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            retries: counters.retries.load(Ordering::Relaxed),
            gave_up: counters.gave_up.load(Ordering::Relaxed),
        }
    }

    /// Submits a price alert.
    ///
    /// Ineligible alerts are dropped without a trace. Eligible ones get a
    /// `pending` audit record and are offered to the queue; a dispatch pass
    /// is then triggered in the background. Delivery outcome is never
    /// reported to the caller.
    pub async fn request_notification(&self, alert: PriceAlert) -> RequestOutcome {
        let now = Instant::now();
        let eligibility = self.inner.state.lock().filter.evaluate(
            &alert.subject,
            alert.magnitude_percent,
            now,
        );

        match eligibility {
            Eligibility::Eligible => {}
            Eligibility::BelowThreshold => {
                debug!(
                    "Ignoring {} move of {}% (below threshold)",
                    alert.subject, alert.magnitude_percent
                );
                return RequestOutcome::BelowThreshold;
            }
            Eligibility::CoolingDown => {
                debug!("Suppressing alert for {} (cooldown)", alert.subject);
                return RequestOutcome::Suppressed;
            }
        }

        let request = NotificationRequest::from_alert(alert, now);

        if let Err(e) = self.inner.audit.record_pending(&request).await {
            warn!(
                "Failed to record pending notification {} for {}: {}",
                request.id, request.subject, e
            );
        }

        let id = request.id;
        let subject = request.subject.clone();
        let magnitude_percent = request.magnitude_percent;

        let (result, queue_len) = {
            let mut state = self.inner.state.lock();
            let result = state.queue.push(request);
            (result, state.queue.len())
        };

        let outcome = match result {
            EnqueueResult::Accepted => RequestOutcome::Queued,
            EnqueueResult::Replaced { evicted } => {
                debug!(
                    "Queue full, {} ({}%) evicted by {}",
                    evicted.subject, evicted.magnitude_percent, subject
                );
                self.record_drop(&evicted, DropReason::Evicted);
                RequestOutcome::Replaced
            }
            EnqueueResult::Rejected => {
                debug!("Queue full, dropping alert for {}", subject);
                self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                self.emit(DispatchEvent::Dropped {
                    id,
                    subject,
                    reason: DropReason::QueueFull,
                });
                return RequestOutcome::Dropped;
            }
        };

        self.inner.counters.queued.fetch_add(1, Ordering::Relaxed);
        self.emit(DispatchEvent::Queued {
            id,
            subject,
            magnitude_percent,
            queue_len,
        });

        self.trigger();
        outcome
    }

    /// Runs one dispatch pass.
    ///
    /// No-op while another pass is running or the queue is empty. Inside the
    /// rate-limit window it only arms a wake-up for the window's end.
    /// Otherwise it sends the largest queued move, consumes the window
    /// whatever the outcome, prunes stale entries and re-arms itself if work
    /// remains.
    pub async fn process_queue(&self) {
        let window = self.inner.config.rate_limit_window();

        let request = {
            let mut state = self.inner.state.lock();
            if state.is_processing || state.queue.is_empty() {
                return;
            }

            let now = Instant::now();
            if let Some(last) = state.last_sent_at {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < window {
                    self.arm_wake(&mut state, window - elapsed);
                    return;
                }
            }

            let Some(request) = state.queue.pop_highest() else {
                return;
            };
            state.is_processing = true;
            state.last_sent_at = Some(now);
            request
        };

        if let Err(error) = self.attempt_delivery(&request, 0).await
            && let Some(delay) = self.plan_retry(&request, 0, &error)
        {
            self.spawn_retries(request, delay);
        }

        let stale = {
            let mut state = self.inner.state.lock();
            let stale = state
                .queue
                .prune_stale(Instant::now(), self.inner.config.stale_after());
            state.is_processing = false;
            if !state.queue.is_empty() {
                self.arm_wake(&mut state, window);
            }
            stale
        };

        for request in &stale {
            debug!("Pruning stale alert for {}", request.subject);
            self.record_drop(request, DropReason::Stale);
        }
    }

    /// Spawns a dispatch pass.
    fn trigger(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            this.process_queue().await;
        });
    }

    /// Schedules one dispatch pass after `delay`, unless one is already armed.
    fn arm_wake(&self, state: &mut DispatchState, delay: Duration) {
        if state.wake_armed {
            return;
        }
        state.wake_armed = true;

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.inner.state.lock().wake_armed = false;
            this.process_queue().await;
        });
    }

    /// Makes one delivery attempt and records its outcome.
    async fn attempt_delivery(
        &self,
        request: &NotificationRequest,
        attempt: u32,
    ) -> Result<(), DeliveryError> {
        let message = request.message();
        let attempts = attempt + 1;

        match self.inner.notifier.send(&message).await {
            Ok(()) => {
                info!(
                    "Sent alert for {} (attempt {})",
                    request.subject, attempts
                );
                self.inner.counters.sent.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = self
                    .inner
                    .audit
                    .mark_sent(request.id, attempts, Utc::now())
                    .await
                {
                    warn!("Failed to mark notification {} sent: {}", request.id, e);
                }
                self.emit(DispatchEvent::Sent {
                    id: request.id,
                    subject: request.subject.clone(),
                    attempt,
                });
                Ok(())
            }
            Err(error) => {
                warn!(
                    "Alert for {} failed (attempt {}): {}",
                    request.subject, attempts, error
                );
                self.inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                let detail = error.to_string();
                if let Err(e) = self
                    .inner
                    .audit
                    .mark_failed(request.id, attempts, &detail)
                    .await
                {
                    warn!("Failed to mark notification {} failed: {}", request.id, e);
                }
                self.emit(DispatchEvent::Failed {
                    id: request.id,
                    subject: request.subject.clone(),
                    attempt,
                    error: detail,
                });
                Err(error)
            }
        }
    }

    /// Decides whether a failed attempt gets another try.
    ///
    /// Returns the backoff delay, or `None` once retries are exhausted or
    /// the policy refuses the error.
    fn plan_retry(
        &self,
        request: &NotificationRequest,
        attempt: u32,
        error: &DeliveryError,
    ) -> Option<Duration> {
        let config = &self.inner.config;

        if attempt < config.max_retries && config.retry_policy.should_retry(error) {
            let delay = config.backoff(attempt);
            debug!(
                "Retrying alert for {} in {}s",
                request.subject,
                delay.as_secs()
            );
            self.inner.counters.retries.fetch_add(1, Ordering::Relaxed);
            self.emit(DispatchEvent::RetryScheduled {
                id: request.id,
                subject: request.subject.clone(),
                attempt: attempt + 1,
                delay_secs: delay.as_secs(),
            });
            Some(delay)
        } else {
            warn!(
                "Giving up on alert for {} after {} attempts",
                request.subject,
                attempt + 1
            );
            self.inner.counters.gave_up.fetch_add(1, Ordering::Relaxed);
            self.emit(DispatchEvent::GaveUp {
                id: request.id,
                subject: request.subject.clone(),
                attempts: attempt + 1,
            });
            None
        }
    }

    /// Runs the retry chain of one request on a timer task.
    fn spawn_retries(&self, request: NotificationRequest, first_delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut attempt = 1;
            let mut delay = first_delay;
            loop {
                tokio::time::sleep(delay).await;
                match this.attempt_delivery(&request, attempt).await {
                    Ok(()) => break,
                    Err(error) => match this.plan_retry(&request, attempt, &error) {
                        Some(next) => {
                            delay = next;
                            attempt += 1;
                        }
                        None => break,
                    },
                }
            }
        });
    }

    fn record_drop(&self, request: &NotificationRequest, reason: DropReason) {
        self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
        self.emit(DispatchEvent::Dropped {
            id: request.id,
            subject: request.subject.clone(),
            reason,
        });
    }

    fn emit(&self, event: DispatchEvent) {
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(event);
    }
}
