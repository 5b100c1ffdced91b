//! Unit tests for the dispatcher.
//!
//! All timing tests run on a paused clock; sleeping in the test advances
//! virtual time and fires the dispatcher's timers in order.

use super::*;
use crate::audit::{AuditError, AuditQuery, AuditRecord, AuditSink, AuditStatus, MemoryAuditSink};
use crate::config::{DispatcherConfig, RetryPolicy};
use crate::notifier::{DeliveryError, Notifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeNotifier {
    calls: Mutex<Vec<(Instant, String)>>,
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    fallback: Mutex<Option<DeliveryError>>,
    delay: Option<Duration>,
}

impl FakeNotifier {
    fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing(error: DeliveryError) -> Arc<Self> {
        let notifier = Self::default();
        *notifier.fallback.lock() = Some(error);
        Arc::new(notifier)
    }

    fn scripted(results: Vec<Result<(), DeliveryError>>) -> Arc<Self> {
        let notifier = Self::default();
        *notifier.script.lock() = results.into();
        Arc::new(notifier)
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    fn calls(&self) -> Vec<(Instant, String)> {
        self.calls.lock().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, message: &str) -> Result<(), DeliveryError> {
        self.calls.lock().push((Instant::now(), message.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        if let Some(result) = scripted {
            return result;
        }
        match self.fallback.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct RecordingAudit {
    records: MemoryAuditSink,
    ops: Mutex<Vec<(&'static str, Uuid)>>,
}

impl RecordingAudit {
    fn kinds(&self) -> Vec<&'static str> {
        self.ops.lock().iter().map(|(kind, _)| *kind).collect()
    }

    fn ids(&self) -> Vec<Uuid> {
        self.ops.lock().iter().map(|(_, id)| *id).collect()
    }

    fn single(&self) -> AuditRecord {
        let all = self.records.all();
        assert_eq!(all.len(), 1, "expected exactly one audit record");
        all.into_iter().next().unwrap()
    }

    fn by_subject(&self, subject: &str) -> AuditRecord {
        self.records
            .all()
            .into_iter()
            .find(|r| r.subject == subject)
            .unwrap()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record_pending(&self, request: &NotificationRequest) -> Result<(), AuditError> {
        self.ops.lock().push(("pending", request.id));
        self.records.record_pending(request).await
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        attempts: u32,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        self.ops.lock().push(("sent", id));
        self.records.mark_sent(id, attempts, sent_at).await
    }

    async fn mark_failed(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), AuditError> {
        self.ops.lock().push(("failed", id));
        self.records.mark_failed(id, attempts, error).await
    }

    async fn recent(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        self.records.recent(query).await
    }
}

struct UnavailableAudit;

#[async_trait]
impl AuditSink for UnavailableAudit {
    async fn record_pending(&self, _request: &NotificationRequest) -> Result<(), AuditError> {
        Err(AuditError::Store("database unavailable".to_string()))
    }

    async fn mark_sent(
        &self,
        _id: Uuid,
        _attempts: u32,
        _sent_at: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        Err(AuditError::Store("database unavailable".to_string()))
    }

    async fn mark_failed(
        &self,
        _id: Uuid,
        _attempts: u32,
        _error: &str,
    ) -> Result<(), AuditError> {
        Err(AuditError::Store("database unavailable".to_string()))
    }

    async fn recent(&self, _query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        Err(AuditError::Store("database unavailable".to_string()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn build(notifier: Arc<FakeNotifier>) -> (NotificationDispatcher, Arc<RecordingAudit>) {
    build_with(DispatcherConfig::default(), notifier)
}

fn build_with(
    config: DispatcherConfig,
    notifier: Arc<FakeNotifier>,
) -> (NotificationDispatcher, Arc<RecordingAudit>) {
    let audit = Arc::new(RecordingAudit::default());
    let sink: Arc<dyn AuditSink> = audit.clone();
    let dispatcher = NotificationDispatcher::new(config, notifier, sink);
    (dispatcher, audit)
}

fn alert(subject: &str, magnitude: f64) -> PriceAlert {
    PriceAlert::new(subject, Direction::Up, magnitude, "My View", 150.0)
}

/// Lets spawned dispatcher tasks run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    settle().await;
}

fn assert_gap(earlier: Instant, later: Instant, expected_secs: u64) {
    let gap = later.duration_since(earlier);
    let expected = Duration::from_secs(expected_secs);
    assert!(
        gap >= expected && gap < expected + Duration::from_secs(1),
        "expected gap of ~{}s, got {:?}",
        expected_secs,
        gap
    );
}

// ============================================================================
// Eligibility
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_small_moves_produce_no_audit_and_no_send() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, audit) = build(notifier.clone());

    let up = dispatcher.request_notification(alert("BTCUSDT", 4.99)).await;
    let down = dispatcher
        .request_notification(PriceAlert::new("ETHUSDT", Direction::Down, -3.0, "My View", 20.0))
        .await;
    settle().await;

    assert_eq!(up, RequestOutcome::BelowThreshold);
    assert_eq!(down, RequestOutcome::BelowThreshold);
    assert!(audit.kinds().is_empty());
    assert_eq!(notifier.call_count(), 0);
    assert_eq!(dispatcher.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_within_ten_seconds_is_suppressed() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, audit) = build(notifier.clone());

    let first = dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    advance(5).await;
    let second = dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    advance(300).await;

    assert_eq!(first, RequestOutcome::Queued);
    assert_eq!(second, RequestOutcome::Suppressed);
    assert_eq!(audit.records.len(), 1);
    assert_eq!(notifier.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_lasts_two_windows() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    advance(119).await;
    let during = dispatcher.request_notification(alert("BTCUSDT", 30.0)).await;
    advance(2).await;
    let after = dispatcher.request_notification(alert("BTCUSDT", 8.0)).await;
    settle().await;

    assert_eq!(during, RequestOutcome::Suppressed);
    assert_eq!(after, RequestOutcome::Queued);
    assert_eq!(audit.records.len(), 2);
    assert_eq!(notifier.call_count(), 2);
}

// ============================================================================
// End-to-end delivery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_alert_is_audited_sent_and_marked_sent() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, audit) = build(notifier.clone());

    let outcome = dispatcher
        .request_notification(PriceAlert::new(
            "BTCUSDT",
            Direction::Up,
            7.5,
            "My View",
            150.0,
        ))
        .await;
    settle().await;

    assert_eq!(outcome, RequestOutcome::Queued);

    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.contains("ALERT BTCUSDT went UP 7.50%"));
    assert!(calls[0].1.contains("$150.00"));

    assert_eq!(audit.kinds(), vec!["pending", "sent"]);
    let ids = audit.ids();
    assert_eq!(ids[0], ids[1]);

    let record = audit.single();
    assert_eq!(record.status, AuditStatus::Sent);
    assert_eq!(record.attempts, 1);
    assert!(record.sent_at.is_some());
    assert_eq!(dispatcher.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_audit_failure_does_not_block_delivery() {
    let notifier = FakeNotifier::ok();
    let dispatcher = NotificationDispatcher::new(
        DispatcherConfig::default(),
        notifier.clone(),
        Arc::new(UnavailableAudit),
    );

    let outcome = dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    settle().await;

    assert_eq!(outcome, RequestOutcome::Queued);
    assert_eq!(notifier.call_count(), 1);
    assert_eq!(dispatcher.stats().sent, 1);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_one_initial_send_per_window_largest_first() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, _audit) = build(notifier.clone());

    dispatcher.request_notification(alert("ADAUSDT", 6.0)).await;
    dispatcher
        .request_notification(PriceAlert::new("BTCUSDT", Direction::Down, -12.0, "My View", 40.0))
        .await;
    dispatcher.request_notification(alert("ETHUSDT", 9.0)).await;
    settle().await;
    assert_eq!(notifier.call_count(), 1);

    advance(30).await;
    assert_eq!(notifier.call_count(), 1);

    advance(30).await;
    assert_eq!(notifier.call_count(), 2);

    advance(60).await;
    assert_eq!(notifier.call_count(), 3);

    advance(300).await;
    let calls = notifier.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].1.contains("BTCUSDT"));
    assert!(calls[1].1.contains("ETHUSDT"));
    assert!(calls[2].1.contains("ADAUSDT"));
    assert_gap(calls[0].0, calls[1].0, 60);
    assert_gap(calls[1].0, calls[2].0, 60);
    assert_eq!(dispatcher.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_inside_window_waits_for_window_end() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, _audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    settle().await;
    advance(20).await;
    dispatcher.request_notification(alert("ETHUSDT", 7.5)).await;
    advance(30).await;
    assert_eq!(notifier.call_count(), 1);

    advance(15).await;
    let calls = notifier.calls();
    assert_eq!(calls.len(), 2);
    assert_gap(calls[0].0, calls[1].0, 60);
}

#[tokio::test(start_paused = true)]
async fn test_failed_attempt_still_consumes_window() {
    let config = DispatcherConfig {
        max_retries: 0,
        ..Default::default()
    };
    let notifier = FakeNotifier::scripted(vec![Err(DeliveryError::Rejected {
        status: 500,
        body: "down".to_string(),
    })]);
    let (dispatcher, audit) = build_with(config, notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 12.0)).await;
    dispatcher.request_notification(alert("ETHUSDT", 6.0)).await;
    settle().await;
    assert_eq!(notifier.call_count(), 1);

    advance(58).await;
    assert_eq!(notifier.call_count(), 1);

    advance(2).await;
    assert_eq!(notifier.call_count(), 2);
    assert_eq!(audit.by_subject("BTCUSDT").status, AuditStatus::Failed);
    assert_eq!(audit.by_subject("ETHUSDT").status, AuditStatus::Sent);
    assert_eq!(dispatcher.stats().gave_up, 1);
}

#[tokio::test(start_paused = true)]
async fn test_process_queue_on_empty_queue_is_noop() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, _audit) = build(notifier.clone());

    dispatcher.process_queue().await;

    assert_eq!(notifier.call_count(), 0);
    assert_eq!(dispatcher.stats().seconds_since_last_send, None);
}

#[tokio::test(start_paused = true)]
async fn test_pass_in_flight_blocks_concurrent_passes() {
    let notifier = FakeNotifier::slow(Duration::from_secs(5));
    let (dispatcher, _audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    settle().await;
    assert!(dispatcher.stats().is_processing);
    assert_eq!(notifier.call_count(), 1);

    dispatcher.request_notification(alert("ETHUSDT", 6.5)).await;
    dispatcher.process_queue().await;
    settle().await;

    let stats = dispatcher.stats();
    assert!(stats.is_processing);
    assert_eq!(stats.queue_len, 1);
    assert_eq!(notifier.call_count(), 1);

    advance(5).await;
    let stats = dispatcher.stats();
    assert!(!stats.is_processing);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.queue_len, 1);
    assert_eq!(notifier.call_count(), 1);

    advance(60).await;
    assert_eq!(notifier.call_count(), 2);
}

// ============================================================================
// Retry and backoff
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rate_limited_send_backs_off_then_gives_up() {
    let notifier = FakeNotifier::failing(DeliveryError::RateLimited {
        body: "slow down".to_string(),
    });
    let (dispatcher, audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    advance(60 + 120 + 240 + 5).await;

    let calls = notifier.calls();
    assert_eq!(calls.len(), 4);
    assert_gap(calls[0].0, calls[1].0, 60);
    assert_gap(calls[1].0, calls[2].0, 120);
    assert_gap(calls[2].0, calls[3].0, 240);

    advance(3600).await;
    assert_eq!(notifier.call_count(), 4);

    let record = audit.single();
    assert_eq!(record.status, AuditStatus::Failed);
    assert_eq!(record.attempts, 4);
    assert!(
        record
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("rate limited")
    );
    assert_eq!(
        audit.kinds(),
        vec!["pending", "failed", "failed", "failed", "failed"]
    );

    let stats = dispatcher.stats();
    assert_eq!(stats.failed, 4);
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.gave_up, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_success_marks_record_sent() {
    let notifier = FakeNotifier::scripted(vec![
        Err(DeliveryError::Transport("connection reset".to_string())),
        Ok(()),
    ]);
    let (dispatcher, audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    advance(61).await;

    assert_eq!(notifier.call_count(), 2);
    assert_eq!(audit.kinds(), vec!["pending", "failed", "sent"]);

    let record = audit.single();
    assert_eq!(record.status, AuditStatus::Sent);
    assert_eq!(record.attempts, 2);
    assert!(record.error_message.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_default_policy_retries_client_errors() {
    let notifier = FakeNotifier::failing(DeliveryError::Rejected {
        status: 400,
        body: "bad topic".to_string(),
    });
    let (dispatcher, _audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    advance(1000).await;

    assert_eq!(notifier.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_transient_only_policy_gives_up_on_client_errors() {
    let config = DispatcherConfig {
        retry_policy: RetryPolicy::TransientOnly,
        ..Default::default()
    };
    let notifier = FakeNotifier::failing(DeliveryError::Rejected {
        status: 400,
        body: "bad topic".to_string(),
    });
    let (dispatcher, audit) = build_with(config, notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    advance(1000).await;

    assert_eq!(notifier.call_count(), 1);
    assert_eq!(audit.single().status, AuditStatus::Failed);
    assert_eq!(dispatcher.stats().gave_up, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_run_outside_the_window() {
    let notifier = FakeNotifier::scripted(vec![Err(DeliveryError::RateLimited {
        body: String::new(),
    })]);
    let (dispatcher, audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 10.0)).await;
    dispatcher.request_notification(alert("ETHUSDT", 6.0)).await;
    settle().await;
    assert_eq!(notifier.call_count(), 1);

    advance(61).await;

    // retry of BTCUSDT and the initial ETHUSDT send land in the same window
    assert_eq!(notifier.call_count(), 3);
    assert_eq!(audit.by_subject("BTCUSDT").status, AuditStatus::Sent);
    assert_eq!(audit.by_subject("ETHUSDT").status, AuditStatus::Sent);
}

// ============================================================================
// Queue bounds
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_queue_full_rejection_is_still_audited() {
    let config = DispatcherConfig {
        max_queue_size: 2,
        ..Default::default()
    };
    let notifier = FakeNotifier::ok();
    let (dispatcher, audit) = build_with(config, notifier.clone());

    assert_eq!(
        dispatcher.request_notification(alert("AAA", 10.0)).await,
        RequestOutcome::Queued
    );
    assert_eq!(
        dispatcher.request_notification(alert("BBB", 9.0)).await,
        RequestOutcome::Queued
    );
    assert_eq!(
        dispatcher.request_notification(alert("CCC", 8.0)).await,
        RequestOutcome::Dropped
    );
    assert_eq!(
        dispatcher.request_notification(alert("DDD", 20.0)).await,
        RequestOutcome::Replaced
    );
    assert_eq!(dispatcher.queue_len(), 2);
    assert_eq!(audit.records.len(), 4);

    advance(300).await;

    let calls = notifier.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].1.contains("DDD"));
    assert!(calls[1].1.contains("AAA"));
    assert_eq!(audit.by_subject("BBB").status, AuditStatus::Pending);
    assert_eq!(audit.by_subject("CCC").status, AuditStatus::Pending);
    assert_eq!(dispatcher.stats().dropped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submitters_respect_capacity() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, audit) = build(notifier.clone());

    let outcomes = futures::future::join_all(
        (0..50).map(|i| dispatcher.request_notification(alert(&format!("SYM{i}"), 6.0 + i as f64))),
    )
    .await;

    assert_eq!(outcomes.len(), 50);
    assert_eq!(audit.records.len(), 50);
    assert_eq!(dispatcher.queue_len(), 25);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == RequestOutcome::Replaced)
            .count(),
        25
    );

    settle().await;

    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.contains("SYM49"));
    assert_eq!(dispatcher.queue_len(), 24);
    assert_eq!(dispatcher.stats().dropped, 25);
}

#[tokio::test(start_paused = true)]
async fn test_stale_entries_are_pruned() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, audit) = build(notifier.clone());

    for (subject, magnitude) in [("AAA", 20.0), ("BBB", 15.0), ("CCC", 10.0), ("DDD", 6.0)] {
        dispatcher.request_notification(alert(subject, magnitude)).await;
    }
    advance(600).await;

    let calls = notifier.calls();
    assert_eq!(calls.len(), 3);
    assert!(!calls.iter().any(|(_, msg)| msg.contains("DDD")));
    assert_eq!(audit.by_subject("DDD").status, AuditStatus::Pending);
    assert_eq!(dispatcher.queue_len(), 0);
    assert_eq!(dispatcher.stats().dropped, 1);
}

// ============================================================================
// Known limitations and observability
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_queued_alert_cannot_be_cancelled_by_reversal() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, _audit) = build(notifier.clone());

    dispatcher.request_notification(alert("AAA", 20.0)).await;
    dispatcher.request_notification(alert("BBB", 10.0)).await;
    advance(30).await;

    // the move reversed, but the pending UP alert stays queued
    let reversal = dispatcher
        .request_notification(PriceAlert::new("BBB", Direction::Down, -12.0, "My View", 150.0))
        .await;
    assert_eq!(reversal, RequestOutcome::Suppressed);

    advance(31).await;
    let calls = notifier.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1.contains("ALERT BBB went UP"));
}

#[tokio::test(start_paused = true)]
async fn test_events_are_broadcast() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, _audit) = build(notifier.clone());
    let mut events = dispatcher.subscribe();

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    settle().await;

    let queued = events.try_recv().unwrap();
    assert!(matches!(queued, DispatchEvent::Queued { queue_len: 1, .. }));
    assert_eq!(queued.subject(), "BTCUSDT");

    let sent = events.try_recv().unwrap();
    assert!(matches!(sent, DispatchEvent::Sent { attempt: 0, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_stats_snapshot() {
    let notifier = FakeNotifier::ok();
    let (dispatcher, _audit) = build(notifier.clone());

    dispatcher.request_notification(alert("BTCUSDT", 7.5)).await;
    dispatcher.request_notification(alert("ETHUSDT", 6.5)).await;
    dispatcher.request_notification(alert("ETHUSDT", 6.5)).await;
    advance(30).await;

    let stats = dispatcher.stats();
    assert_eq!(stats.queue_len, 1);
    assert_eq!(stats.queue_capacity, 25);
    assert!(!stats.is_processing);
    assert_eq!(stats.seconds_since_last_send, Some(30));
    assert_eq!(stats.tracked_subjects, 2);
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.sent, 1);
}
