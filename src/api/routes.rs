//! Route configuration.

use crate::api::{handlers, websocket};
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;

/// Creates the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket
        .route("/ws", get(websocket::ws_handler))
        // Notifications
        .route(
            "/api/v1/notifications",
            get(handlers::list_notifications).post(handlers::create_notification),
        )
        .route(
            "/api/v1/notifications/stats",
            get(handlers::get_dispatcher_stats),
        )
        .with_state(state)
}
