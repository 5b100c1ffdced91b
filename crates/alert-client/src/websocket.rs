//! WebSocket client for the dispatch event feed.

use crate::error::Error;
use crate::types::DropReason;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// WebSocket message types received from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Alert entered the queue.
    #[serde(rename = "queued")]
    Queued {
        /// Notification identifier.
        id: String,
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
        id: String,
        /// Trading symbol.
        subject: String,
        /// Why it was dropped.
        reason: DropReason,
    },
    /// Delivery attempt succeeded.
    #[serde(rename = "sent")]
    Sent {
        /// Notification identifier.
        id: String,
        /// Trading symbol.
        subject: String,
        /// Attempt number, starting at 0.
        attempt: u32,
    },
    /// Delivery attempt failed.
    #[serde(rename = "failed")]
    Failed {
        /// Notification identifier.
        id: String,
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
        id: String,
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
        id: String,
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

impl WsMessage {
    /// Trading symbol of a dispatch event, `None` for control frames.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::Queued { subject, .. }
            | Self::Dropped { subject, .. }
            | Self::Sent { subject, .. }
            | Self::Failed { subject, .. }
            | Self::RetryScheduled { subject, .. }
            | Self::GaveUp { subject, .. } => Some(subject),
            Self::Connected { .. } | Self::Heartbeat { .. } => None,
        }
    }
}

/// Commands that can be sent to the server.
#[derive(Debug, Clone, Serialize)]
pub struct ClientCommand {
    /// Action to perform.
    pub action: String,
    /// Subject the action applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ClientCommand {
    /// Creates a subscribe command.
    #[must_use]
    pub fn subscribe(subject: &str) -> Self {
        Self {
            action: "subscribe".to_string(),
            subject: Some(subject.to_string()),
        }
    }

    /// Creates an unsubscribe command.
    #[must_use]
    pub fn unsubscribe(subject: &str) -> Self {
        Self {
            action: "unsubscribe".to_string(),
            subject: Some(subject.to_string()),
        }
    }
}

/// WebSocket client for receiving dispatch events.
pub struct WsClient {
    rx: mpsc::Receiver<WsMessage>,
    tx: mpsc::Sender<ClientCommand>,
}

impl WsClient {
    /// Connects to the WebSocket server.
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:8080/ws")
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let url = url::Url::parse(url)?;
        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(Box::new)?;
        let (mut write, mut read) = ws_stream.split();

        let (msg_tx, msg_rx) = mpsc::channel::<WsMessage>(100);
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<ClientCommand>(100);

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Ok(ws_msg) = serde_json::from_str::<WsMessage>(&text)
                            && msg_tx.send(ws_msg).await.is_err()
                        {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Err(_) => break,
                    _ => {}
                }
            }
        });

        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                if let Ok(json) = serde_json::to_string(&cmd)
                    && write.send(Message::Text(json.into())).await.is_err()
                {
                    break;
                }
            }
        });

        Ok(Self {
            rx: msg_rx,
            tx: cmd_tx,
        })
    }

    /// Receives the next message from the server.
    ///
    /// Returns `None` if the connection is closed.
    pub async fn recv(&mut self) -> Option<WsMessage> {
        self.rx.recv().await
    }

    /// Sends a command to the server.
    ///
    /// # Errors
    /// Returns error if the send fails.
    pub async fn send(&self, cmd: ClientCommand) -> Result<(), Error> {
        self.tx.send(cmd).await.map_err(|_| Error::ConnectionClosed)
    }

    /// Only receive events for `subject` (and other subscribed subjects).
    ///
    /// # Errors
    /// Returns error if the send fails.
    pub async fn subscribe(&self, subject: &str) -> Result<(), Error> {
        self.send(ClientCommand::subscribe(subject)).await
    }

    /// Stops filtering on `subject`.
    ///
    /// # Errors
    /// Returns error if the send fails.
    pub async fn unsubscribe(&self, subject: &str) -> Result<(), Error> {
        self.send(ClientCommand::unsubscribe(subject)).await
    }
}
