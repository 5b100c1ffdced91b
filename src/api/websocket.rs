//! WebSocket feed of dispatch events.

use crate::dispatcher::{DispatchEvent, DropReason};
use crate::state::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Interval between heartbeat frames.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// WebSocket message types sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Alert entered the queue.
    #[serde(rename = "queued")]
    Queued {
        /// Notification identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Percentage change.
        magnitude_percent: f64,
        /// Queue length after insertion.
        queue_len: usize,
    },
    /// Alert will never be sent.
    #[serde(rename = "dropped")]
    Dropped {
        /// Notification identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Why it was dropped.
        reason: DropReason,
    },
    /// Delivery attempt succeeded.
    #[serde(rename = "sent")]
    Sent {
        /// Notification identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Attempt number, starting at 0.
        attempt: u32,
    },
    /// Delivery attempt failed.
    #[serde(rename = "failed")]
    Failed {
        /// Notification identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Attempt number, starting at 0.
        attempt: u32,
        /// Failure detail.
        error: String,
    },
    /// Retry scheduled after backoff.
    #[serde(rename = "retry_scheduled")]
    RetryScheduled {
        /// Notification identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Attempt number of the retry.
        attempt: u32,
        /// Delay before the retry in seconds.
        delay_secs: u64,
    },
    /// Retries exhausted.
    #[serde(rename = "gave_up")]
    GaveUp {
        /// Notification identifier.
        id: Uuid,
        /// Trading symbol.
        subject: String,
        /// Total attempts made.
        attempts: u32,
    },
    /// Connection established.
    #[serde(rename = "connected")]
    Connected {
        /// Welcome message.
        message: String,
    },
    /// Heartbeat/ping.
    #[serde(rename = "heartbeat")]
    Heartbeat {
        /// Timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<DispatchEvent> for WsMessage {
    fn from(event: DispatchEvent) -> Self {
        match event {
            DispatchEvent::Queued {
                id,
                subject,
                magnitude_percent,
                queue_len,
            } => WsMessage::Queued {
                id,
                subject,
                magnitude_percent,
                queue_len,
            },
            DispatchEvent::Dropped {
                id,
                subject,
                reason,
            } => WsMessage::Dropped {
                id,
                subject,
                reason,
            },
            DispatchEvent::Sent {
                id,
                subject,
                attempt,
            } => WsMessage::Sent {
                id,
                subject,
                attempt,
            },
            DispatchEvent::Failed {
                id,
                subject,
                attempt,
                error,
            } => WsMessage::Failed {
                id,
                subject,
                attempt,
                error,
            },
            DispatchEvent::RetryScheduled {
                id,
                subject,
                attempt,
                delay_secs,
            } => WsMessage::RetryScheduled {
                id,
                subject,
                attempt,
                delay_secs,
            },
            DispatchEvent::GaveUp {
                id,
                subject,
                attempts,
            } => WsMessage::GaveUp {
                id,
                subject,
                attempts,
            },
        }
    }
}

/// Subjects a connection asked for. Empty means everything.
#[derive(Debug, Default)]
struct SubjectFilter {
    subjects: RwLock<HashSet<String>>,
}

impl SubjectFilter {
    fn subscribe(&self, subject: &str) {
        self.subjects.write().insert(subject.to_uppercase());
    }

    fn unsubscribe(&self, subject: &str) {
        self.subjects.write().remove(&subject.to_uppercase());
    }

    fn allows(&self, subject: &str) -> bool {
        let subjects = self.subjects.read();
        subjects.is_empty() || subjects.contains(&subject.to_uppercase())
    }
}

/// Commands accepted from clients.
#[derive(Debug, Deserialize)]
struct ClientCommand {
    action: String,
    #[serde(default)]
    subject: Option<String>,
}

/// WebSocket upgrade handler.
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "WebSocket connection established")
    ),
    tag = "WebSocket"
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.dispatcher.subscribe();
    let filter = Arc::new(SubjectFilter::default());

    let connected_msg = WsMessage::Connected {
        message: "Connected to price alert dispatcher".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    info!("WebSocket client connected");

    let recv_filter = Arc::clone(&filter);
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!("Received WebSocket message: {}", text);
                    handle_client_message(&text, &recv_filter);
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket client disconnected");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Ok(event) => {
                            if !filter.allows(event.subject()) {
                                continue;
                            }
                            let msg = WsMessage::from(event);
                            if let Ok(json) = serde_json::to_string(&msg)
                                && sender.send(Message::Text(json.into())).await.is_err()
                            {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            debug!("WebSocket lagged {} messages", n);
                        }
                        Err(RecvError::Closed) => {
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS)) => {
                    let heartbeat = WsMessage::Heartbeat {
                        timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
                    };
                    if let Ok(json) = serde_json::to_string(&heartbeat)
                        && sender.send(Message::Text(json.into())).await.is_err()
                    {
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = recv_task => {}
        _ = send_task => {}
    }

    info!("WebSocket connection closed");
}

/// Applies a subscribe/unsubscribe command to the connection's filter.
fn handle_client_message(text: &str, filter: &SubjectFilter) {
    let Ok(cmd) = serde_json::from_str::<ClientCommand>(text) else {
        debug!("Ignoring malformed WebSocket command");
        return;
    };

    match (cmd.action.as_str(), cmd.subject.as_deref()) {
        ("subscribe", Some(subject)) => {
            filter.subscribe(subject);
            debug!("Client subscribed to {}", subject);
        }
        ("unsubscribe", Some(subject)) => {
            filter.unsubscribe(subject);
            debug!("Client unsubscribed from {}", subject);
        }
        _ => {
            debug!("Unknown command: {}", cmd.action);
        }
    }
}
