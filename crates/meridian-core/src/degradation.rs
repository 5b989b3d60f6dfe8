//! Degradation event stream: every degradation emits a `degradation`
//! event with `{component, reason, tenant}`.
//!
//! A concrete, subscribable carrier for the degradation semantics —
//! modeled as a `tokio` broadcast channel so both the ingestion pipeline
//! (C8) and the mission orchestrator (C9) can observe degradations
//! without a hard dependency between them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub component: String,
    pub reason: String,
    pub tenant: String,
    pub workspace: String,
    pub detail: Option<String>,
}

#[derive(Clone)]
pub struct DegradationBus {
    sender: broadcast::Sender<DegradationEvent>,
}

impl DegradationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DegradationEvent> {
        self.sender.subscribe()
    }

    /// Emits the event; never errors even with zero subscribers. This is
    /// a fire-and-forget observability concern, not a delivery guarantee.
    pub fn emit(&self, event: DegradationEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for DegradationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = DegradationBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(DegradationEvent {
            component: "ingest".into(),
            reason: "transcription_failed".into(),
            tenant: "t1".into(),
            workspace: "w1".into(),
            detail: None,
        });
        let event = rx.recv().await.expect("event delivered");
        assert_eq!(event.reason, "transcription_failed");
    }

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let bus = DegradationBus::new(8);
        bus.emit(DegradationEvent {
            component: "ingest".into(),
            reason: "x".into(),
            tenant: "t1".into(),
            workspace: "w1".into(),
            detail: None,
        });
    }
}
