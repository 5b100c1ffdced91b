//! # Price Alert Backend
//!
//! Rate-limited, best-effort delivery of crypto price alerts to a push
//! notification endpoint. Built with [Axum](https://crates.io/crates/axum)
//! and documented via [utoipa](https://crates.io/crates/utoipa).
//!
//! ## Key Features
//!
//! - **Eligibility Filter**: Moves below the threshold are ignored and each
//!   subject cools down for two rate-limit windows after an accepted alert.
//!
//! - **Bounded Priority Queue**: At most 25 waiting alerts; when full, a
//!   larger move evicts the smallest one.
//!
//! - **Rate Limiting**: One initial send per window across all subjects,
//!   largest move first.
//!
//! - **Backoff**: Failed sends are retried after 60s, 120s and 240s.
//!
//! - **Audit Trail**: Every eligible alert is recorded as `pending` and moved
//!   to `sent` or `failed`, in PostgreSQL or in memory.
//!
//! - **Realtime Feed**: Dispatch events over WebSocket at `/ws`.
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Route handlers, router and WebSocket feed |
//! | [`audit`] | Audit sink trait, records and in-memory sink |
//! | [`config`] | TOML configuration with environment overrides |
//! | [`db`] | PostgreSQL pool and audit sink |
//! | [`dispatcher`] | Eligibility filter, queue and rate-limited delivery |
//! | [`error`] | API error types with `IntoResponse` implementation |
//! | [`models`] | Request/response DTOs with OpenAPI schemas |
//! | [`notifier`] | Outbound HTTP notification channel |
//! | [`state`] | Application state management |
//!
//! ## API Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/v1/notifications` | Submit a price alert |
//! | GET | `/api/v1/notifications` | Recent audit records |
//! | GET | `/api/v1/notifications/stats` | Dispatcher snapshot |
//! | GET | `/ws` | Dispatch event feed |
//!
//! ## Example Usage
//!
//! ```bash
//! # In-memory audit trail
//! NOTIFY_ENDPOINT=https://ntfy.sh/my-alerts cargo run
//!
//! # PostgreSQL audit trail and a config file
//! DATABASE_URL=postgres://localhost/alerts CONFIG_PATH=config.toml cargo run
//!
//! # Submit an alert
//! curl -X POST http://localhost:8080/api/v1/notifications \
//!   -H "Content-Type: application/json" \
//!   -d '{"subject":"BTCUSDT","direction":"UP","magnitude_percent":7.5,"context_label":"My View","impact_amount":150.0}'
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod notifier;
pub mod state;
