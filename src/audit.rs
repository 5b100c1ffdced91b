//! Audit trail of notification attempts.
//!
//! Every eligible alert gets one record, created as `pending` before it is
//! queued and moved to `sent` or `failed` after each delivery attempt. The
//! dispatcher only writes here; nothing read back influences its decisions.

use crate::dispatcher::{Direction, NotificationRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Default number of records returned by [`AuditSink::recent`].
pub const DEFAULT_RECENT_LIMIT: u32 = 50;

/// Upper bound on records returned by [`AuditSink::recent`].
pub const MAX_RECENT_LIMIT: u32 = 500;

/// Audit sink errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Backing store failure.
    #[error("audit store error: {0}")]
    Store(String),

    /// Record to update does not exist.
    #[error("audit record not found: {0}")]
    NotFound(Uuid),
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        AuditError::Store(err.to_string())
    }
}

/// Lifecycle status of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Accepted by the filter, not yet delivered.
    Pending,
    /// Delivered.
    Sent,
    /// Last attempt failed.
    Failed,
}

impl AuditStatus {
    /// Parse from string, unknown values map to `Pending`.
    #[must_use]
    pub fn from_str_value(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sent" => Self::Sent,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Convert to string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRecord {
    /// Record identifier (same as the request id).
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
    /// Rendered message.
    pub message: String,
    /// Current status.
    pub status: AuditStatus,
    /// Error detail of the last failed attempt.
    pub error_message: Option<String>,
    /// Delivery attempts made so far.
    pub attempts: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Successful delivery time.
    pub sent_at: Option<DateTime<Utc>>,
}

impl AuditRecord {
    /// Builds the initial `pending` record for a request.
    #[must_use]
    pub fn pending(request: &NotificationRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id.clone(),
            subject: request.subject.clone(),
            direction: request.direction,
            magnitude_percent: request.magnitude_percent,
            context_label: request.context_label.clone(),
            impact_amount: request.impact_amount,
            message: request.message(),
            status: AuditStatus::Pending,
            error_message: None,
            attempts: 0,
            created_at: request.created_at,
            updated_at: request.created_at,
            sent_at: None,
        }
    }
}

/// Filter for listing audit records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Maximum number of records (default 50, max 500).
    pub limit: Option<u32>,
    /// Only records for this subject.
    pub subject: Option<String>,
    /// Only records with this status.
    pub status: Option<AuditStatus>,
}

impl AuditQuery {
    /// Effective limit after applying default and cap.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .min(MAX_RECENT_LIMIT)
    }

    fn matches(&self, record: &AuditRecord) -> bool {
        self.subject.as_ref().is_none_or(|s| &record.subject == s)
            && self.status.is_none_or(|s| record.status == s)
    }
}

/// Durable store for notification lifecycles.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Creates the `pending` record for an eligible request.
    async fn record_pending(&self, request: &NotificationRequest) -> Result<(), AuditError>;

    /// Marks a record delivered after `attempts` attempts.
    async fn mark_sent(
        &self,
        id: Uuid,
        attempts: u32,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AuditError>;

    /// Marks a record failed after `attempts` attempts.
    async fn mark_failed(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), AuditError>;

    /// Lists records, newest first.
    async fn recent(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError>;
}

/// Process-local audit sink, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: DashMap<Uuid, AuditRecord>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of one record.
    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<AuditRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns copies of all records, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<AuditRecord> {
        let mut records: Vec<AuditRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record_pending(&self, request: &NotificationRequest) -> Result<(), AuditError> {
        self.records
            .insert(request.id, AuditRecord::pending(request));
        Ok(())
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        attempts: u32,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        let mut record = self.records.get_mut(&id).ok_or(AuditError::NotFound(id))?;
        record.status = AuditStatus::Sent;
        record.attempts = attempts;
        record.error_message = None;
        record.sent_at = Some(sent_at);
        record.updated_at = sent_at;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), AuditError> {
        let mut record = self.records.get_mut(&id).ok_or(AuditError::NotFound(id))?;
        record.status = AuditStatus::Failed;
        record.attempts = attempts;
        record.error_message = Some(error.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn recent(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        let mut records: Vec<AuditRecord> = self
            .records
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(query.effective_limit() as usize);
        Ok(records)
    }
}
