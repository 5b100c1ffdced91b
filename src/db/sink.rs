//! PostgreSQL-backed audit sink.

use crate::audit::{AuditError, AuditQuery, AuditRecord, AuditSink, AuditStatus};
use crate::db::{DatabasePool, NotificationRow};
use crate::dispatcher::NotificationRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Audit sink writing to `price_alert_notifications`.
#[derive(Clone)]
pub struct PgAuditSink {
    db: DatabasePool,
}

impl PgAuditSink {
    /// Creates a sink over an established pool.
    #[must_use]
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AuditStatus,
        attempts: u32,
        error: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<(), AuditError> {
        let result = sqlx::query(
            r#"
            UPDATE price_alert_notifications
            SET status = $2,
                attempts = $3,
                error_message = $4,
                sent_at = COALESCE($5, sent_at),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(i32::try_from(attempts).unwrap_or(i32::MAX))
        .bind(error)
        .bind(sent_at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuditError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record_pending(&self, request: &NotificationRequest) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO price_alert_notifications
                (id, user_id, subject, direction, magnitude_percent, context_label,
                 impact_amount, message, status, attempts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', 0, $9, $9)
            "#,
        )
        .bind(request.id)
        .bind(&request.user_id)
        .bind(&request.subject)
        .bind(request.direction.as_str())
        .bind(request.magnitude_percent)
        .bind(&request.context_label)
        .bind(request.impact_amount)
        .bind(request.message())
        .bind(request.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        attempts: u32,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        self.update_status(id, AuditStatus::Sent, attempts, None, Some(sent_at))
            .await
    }

    async fn mark_failed(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), AuditError> {
        self.update_status(id, AuditStatus::Failed, attempts, Some(error), None)
            .await
    }

    async fn recent(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, subject, direction, magnitude_percent, context_label,
                   impact_amount, message, status, error_message, attempts,
                   created_at, updated_at, sent_at
            FROM price_alert_notifications
            WHERE ($1::text IS NULL OR subject = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(query.subject.as_deref())
        .bind(query.status.map(|s| s.as_str()))
        .bind(i64::from(query.effective_limit()))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(AuditRecord::from).collect())
    }
}
