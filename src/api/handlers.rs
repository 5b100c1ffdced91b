//! API request handlers.

use crate::audit::AuditQuery;
use crate::dispatcher::DispatcherStats;
use crate::error::ApiError;
use crate::models::{
    CreateNotificationRequest, CreateNotificationResponse, HealthResponse,
    NotificationListResponse,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::debug;


// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Notifications
// ============================================================================

/// Submit a price alert.
///
/// The alert is filtered, audited and queued; delivery happens later and is
/// not reflected in the response.
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 202, description = "Alert accepted for evaluation", body = CreateNotificationResponse),
        (status = 400, description = "Invalid alert")
    ),
    tag = "Notifications"
)]
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<CreateNotificationResponse>), ApiError> {
    let alert = request.into_alert()?;
    let subject = alert.subject.clone();

    let outcome = state.dispatcher.request_notification(alert).await;
    debug!("Alert for {} -> {:?}", subject, outcome);

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateNotificationResponse { outcome }),
    ))
}

/// List recent notification audit records.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(AuditQuery),
    responses(
        (status = 200, description = "Recent notifications", body = NotificationListResponse),
        (status = 500, description = "Audit store unavailable")
    ),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let notifications = state.audit.recent(&query).await?;
    let count = notifications.len();

    Ok(Json(NotificationListResponse {
        notifications,
        count,
    }))
}

/// Get dispatcher statistics.
#[utoipa::path(
    get,
    path = "/api/v1/notifications/stats",
    responses(
        (status = 200, description = "Dispatcher snapshot", body = DispatcherStats)
    ),
    tag = "Notifications"
)]
pub async fn get_dispatcher_stats(State(state): State<Arc<AppState>>) -> Json<DispatcherStats> {
    Json(state.dispatcher.stats())
}
