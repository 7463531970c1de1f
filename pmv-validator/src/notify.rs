//! Real-time fan-out
//!
//! Sinks are registered on a `Notifier`; every completed validation (and
//! every pipeline failure) is pushed to all of them. Delivery is
//! best-effort: sinks must never block, and a failing sink is logged and
//! otherwise ignored.

use crate::error::{ValidatorError, ValidatorResult};
use pmv_common::events::{EventBus, RealtimeMessage};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Destination for real-time messages
pub trait EventSink: Send + Sync {
    /// Deliver without blocking; `Err` means the message was dropped
    fn deliver(&self, message: RealtimeMessage) -> ValidatorResult<()>;
}

/// Bounded mpsc-backed sink for one consumer (e.g. one socket connection)
pub struct ChannelSink {
    tx: mpsc::Sender<RealtimeMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver its consumer reads from
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RealtimeMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, message: RealtimeMessage) -> ValidatorResult<()> {
        self.tx
            .try_send(message)
            .map_err(|e| ValidatorError::Pipeline(format!("channel sink rejected message: {}", e)))
    }
}

impl EventSink for EventBus {
    fn deliver(&self, message: RealtimeMessage) -> ValidatorResult<()> {
        // No listeners is not a delivery failure
        self.emit_lossy(message);
        Ok(())
    }
}

/// Deliver to one sink, turning a panic inside the sink into an error
fn deliver_isolated(sink: &dyn EventSink, message: RealtimeMessage) -> ValidatorResult<()> {
    panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(message))).unwrap_or_else(|_| {
        warn!("Event sink panicked during delivery");
        Err(ValidatorError::Pipeline("event sink panicked".to_string()))
    })
}

/// Registered sinks plus the in-process broadcast bus
pub struct Notifier {
    sinks: RwLock<Vec<(Uuid, Arc<dyn EventSink>)>>,
    bus: EventBus,
}

impl Notifier {
    pub fn new(bus_capacity: usize) -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            bus: EventBus::new(bus_capacity),
        }
    }

    /// The broadcast bus every message is also published on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Register a sink and send it the `connected` acknowledgement
    pub async fn register(&self, sink: Arc<dyn EventSink>) -> Uuid {
        let id = Uuid::new_v4();
        if let Err(e) = deliver_isolated(sink.as_ref(), RealtimeMessage::connected()) {
            debug!(sink = %id, error = %e, "Connected acknowledgement not delivered");
        }
        self.sinks.write().await.push((id, sink));
        debug!(sink = %id, "Sink registered");
        id
    }

    /// Remove a sink; returns false when it was not registered
    pub async fn unregister(&self, id: Uuid) -> bool {
        let mut sinks = self.sinks.write().await;
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id);
        sinks.len() != before
    }

    /// Push a message to every sink and the bus
    pub async fn notify(&self, message: RealtimeMessage) {
        self.bus.emit_lossy(message.clone());
        let sinks = self.sinks.read().await;
        for (id, sink) in sinks.iter() {
            if let Err(e) = deliver_isolated(sink.as_ref(), message.clone()) {
                debug!(
                    sink = %id,
                    event = message.event.as_str(),
                    error = %e,
                    "Sink delivery failed"
                );
            }
        }
    }

    pub async fn sink_count(&self) -> usize {
        self.sinks.read().await.len()
    }

    /// Drop every registered sink
    pub async fn clear(&self) {
        self.sinks.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmv_common::events::EventKind;
    use serde_json::json;

    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn deliver(&self, _: RealtimeMessage) -> ValidatorResult<()> {
            Err(ValidatorError::Pipeline("socket closed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_register_sends_connected() {
        let notifier = Notifier::new(16);
        let (sink, mut rx) = ChannelSink::channel(8);
        notifier.register(Arc::new(sink)).await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, EventKind::Connected);
    }

    #[tokio::test]
    async fn test_broken_sink_does_not_block_others() {
        let notifier = Notifier::new(16);
        let (sink, mut rx) = ChannelSink::channel(8);
        notifier.register(Arc::new(BrokenSink)).await;
        notifier.register(Arc::new(sink)).await;
        let mut bus_rx = notifier.bus().subscribe();

        notifier
            .notify(RealtimeMessage::new(EventKind::ValidationUpdate, json!({"ok": true})))
            .await;

        assert_eq!(rx.recv().await.unwrap().event, EventKind::Connected);
        assert_eq!(rx.recv().await.unwrap().event, EventKind::ValidationUpdate);
        assert_eq!(bus_rx.recv().await.unwrap().event, EventKind::ValidationUpdate);
    }

    struct PanickingSink;

    impl EventSink for PanickingSink {
        fn deliver(&self, _: RealtimeMessage) -> ValidatorResult<()> {
            panic!("sink bug")
        }
    }

    #[tokio::test]
    async fn test_panicking_sink_is_contained() {
        let notifier = Notifier::new(16);
        notifier.register(Arc::new(PanickingSink)).await;
        let (sink, mut rx) = ChannelSink::channel(8);
        notifier.register(Arc::new(sink)).await;

        notifier
            .notify(RealtimeMessage::new(EventKind::ValidationUpdate, json!({"ok": true})))
            .await;

        assert_eq!(rx.recv().await.unwrap().event, EventKind::Connected);
        assert_eq!(rx.recv().await.unwrap().event, EventKind::ValidationUpdate);
        assert_eq!(notifier.sink_count().await, 2);
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let notifier = Notifier::new(16);
        let (sink, _rx) = ChannelSink::channel(1);
        // The connected message fills the channel
        notifier.register(Arc::new(sink)).await;
        notifier
            .notify(RealtimeMessage::new(EventKind::ValidationUpdate, json!(null)))
            .await;
        assert_eq!(notifier.sink_count().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_and_clear() {
        let notifier = Notifier::new(16);
        let id = notifier.register(Arc::new(BrokenSink)).await;
        notifier.register(Arc::new(BrokenSink)).await;
        assert!(notifier.unregister(id).await);
        assert!(!notifier.unregister(id).await);
        notifier.clear().await;
        assert_eq!(notifier.sink_count().await, 0);
    }
}
