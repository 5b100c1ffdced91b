//! Application state management.

use crate::audit::{AuditSink, MemoryAuditSink};
use crate::config::Config;
use crate::db::{DatabasePool, PgAuditSink};
use crate::dispatcher::NotificationDispatcher;
use crate::notifier::Notifier;
use std::sync::Arc;
use tracing::info;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The notification dispatcher.
    pub dispatcher: NotificationDispatcher,
    /// Audit sink the dispatcher writes to; read by the listing endpoint.
    pub audit: Arc<dyn AuditSink>,
    /// Optional database pool.
    pub db: Option<DatabasePool>,
    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates the state, wiring the audit sink from the database if present.
    ///
    /// # Arguments
    /// * `config` - Application configuration
    /// * `notifier` - Outbound delivery channel
    /// * `db` - Audit database; `None` keeps records in memory
    #[must_use]
    pub fn from_config(
        config: Config,
        notifier: Arc<dyn Notifier>,
        db: Option<DatabasePool>,
    ) -> Self {
        let audit: Arc<dyn AuditSink> = match &db {
            Some(pool) => {
                info!("Recording notifications in PostgreSQL");
                Arc::new(PgAuditSink::new(pool.clone()))
            }
            None => {
                info!("No database configured, recording notifications in memory");
                Arc::new(MemoryAuditSink::new())
            }
        };

        Self::with_audit(config, notifier, audit, db)
    }

    /// Creates the state around an explicit audit sink.
    #[must_use]
    pub fn with_audit(
        config: Config,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        db: Option<DatabasePool>,
    ) -> Self {
        let dispatcher =
            NotificationDispatcher::new(config.dispatcher.clone(), notifier, Arc::clone(&audit));

        Self {
            dispatcher,
            audit,
            db,
            config: Arc::new(config),
        }
    }
}
