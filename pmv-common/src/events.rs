//! Real-time event types and EventBus
//!
//! Messages pushed to live subscribers use the wire shape
//! `{"event": "...", "data": {...}, "timestamp": "..."}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Real-time event name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Acknowledgement sent once when a sink registers
    Connected,
    /// A validation call completed
    ValidationUpdate,
    /// A validation call failed inside the pipeline
    ValidationError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::ValidationUpdate => "validation_update",
            EventKind::ValidationError => "validation_error",
        }
    }
}

/// Message delivered to real-time subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub event: EventKind,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeMessage {
    pub fn new(event: EventKind, data: serde_json::Value) -> Self {
        Self {
            event,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn connected() -> Self {
        Self::new(EventKind::Connected, serde_json::Value::Null)
    }
}

/// Central broadcast bus for real-time messages
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged subscribers lose the oldest messages instead of stalling senders
///
/// # Examples
///
/// ```
/// use pmv_common::events::{EventBus, RealtimeMessage};
///
/// let bus = EventBus::new(64);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(RealtimeMessage::connected());
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RealtimeMessage>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future messages
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.tx.subscribe()
    }

    /// Emit a message to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        message: RealtimeMessage,
    ) -> Result<usize, broadcast::error::SendError<RealtimeMessage>> {
        self.tx.send(message)
    }

    /// Emit a message, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, message: RealtimeMessage) {
        let _ = self.tx.send(message);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_serializes_snake_case() {
        let message = RealtimeMessage::new(EventKind::ValidationUpdate, json!({"ok": true}));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["event"], "validation_update");
        assert_eq!(value["data"]["ok"], true);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(8);
        assert!(bus.emit(RealtimeMessage::connected()).is_err());
        // Lossy variant never panics
        bus.emit_lossy(RealtimeMessage::connected());
    }

    #[tokio::test]
    async fn test_subscribers_receive_messages() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(RealtimeMessage::new(EventKind::ValidationError, json!("boom")))
            .unwrap();

        assert_eq!(rx1.recv().await.unwrap().event, EventKind::ValidationError);
        assert_eq!(rx2.recv().await.unwrap().event, EventKind::ValidationError);
    }

    #[test]
    fn test_capacity_reported() {
        assert_eq!(EventBus::new(42).capacity(), 42);
        assert_eq!(EventKind::Connected.as_str(), "connected");
    }
}
