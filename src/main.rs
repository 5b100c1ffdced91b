//! Price Alert Backend Server
//!
//! Hosts the rate-limited notification dispatcher behind a REST and
//! WebSocket API.

use anyhow::Context;
use price_alert_backend::api::create_router;
use price_alert_backend::config::Config;
use price_alert_backend::db::DatabasePool;
use price_alert_backend::notifier::HttpNotifier;
use price_alert_backend::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use price_alert_backend::audit::{AuditRecord, AuditStatus};
use price_alert_backend::dispatcher::{Direction, DispatcherStats, RequestOutcome};
use price_alert_backend::error::ErrorResponse;
use price_alert_backend::models::{
    CreateNotificationRequest, CreateNotificationResponse, HealthResponse,
    NotificationListResponse,
};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        price_alert_backend::api::handlers::health_check,
        price_alert_backend::api::handlers::create_notification,
        price_alert_backend::api::handlers::list_notifications,
        price_alert_backend::api::handlers::get_dispatcher_stats,
        price_alert_backend::api::websocket::ws_handler,
    ),
    components(
        schemas(
            HealthResponse,
            CreateNotificationRequest,
            CreateNotificationResponse,
            NotificationListResponse,
            AuditRecord,
            AuditStatus,
            Direction,
            RequestOutcome,
            DispatcherStats,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Notifications", description = "Price alert submission and audit trail"),
        (name = "WebSocket", description = "Realtime dispatch events"),
    ),
    info(
        title = "Price Alert API",
        version = "0.1.0",
        description = "Rate-limited price alert notifications",
        license(name = "MIT"),
        contact(name = "Joaquin Bejar", email = "jb@taunais.com")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let db = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = DatabasePool::connect(&url)
                .await
                .context("connecting to DATABASE_URL")?;
            pool.run_migrations()
                .await
                .context("running audit migrations")?;
            Some(pool)
        }
        Err(_) => None,
    };

    let notifier = HttpNotifier::new(&config.notifier).context("building notifier")?;
    info!("Delivering alerts to {}", notifier.endpoint());

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::from_config(config, Arc::new(notifier), db));

    info!("Starting Price Alert Backend on {}:{}", host, port);
    info!(
        "Swagger UI available at http://{}:{}/swagger-ui/",
        host, port
    );

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = create_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start the server
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
