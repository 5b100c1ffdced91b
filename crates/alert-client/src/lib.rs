//! HTTP client library for the Price Alert API.
//!
//! Typed access to the alert submission, audit and statistics endpoints, plus
//! a WebSocket client for the dispatch event feed.
//!
//! # Example
//!
//! ```no_run
//! use alert_client::{AlertClient, ClientConfig, Direction, NotificationRequest};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), alert_client::Error> {
//!     let client = AlertClient::new(ClientConfig {
//!         base_url: "http://localhost:8080".into(),
//!         timeout: Duration::from_secs(30),
//!     })?;
//!
//!     let request = NotificationRequest::new("BTCUSDT", Direction::Up, 7.5, "My View", 150.0);
//!     let response = client.request_notification(&request).await?;
//!     println!("Outcome: {:?}", response.outcome);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;
mod websocket;

pub use client::{AlertClient, ClientConfig};
pub use error::Error;
pub use types::*;
pub use websocket::{ClientCommand, WsClient, WsMessage};
