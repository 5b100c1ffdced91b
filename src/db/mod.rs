//! Database module for PostgreSQL connection and the audit table.

mod pool;
mod schema;
mod sink;

pub use pool::DatabasePool;
pub use schema::NotificationRow;
pub use sink::PgAuditSink;
