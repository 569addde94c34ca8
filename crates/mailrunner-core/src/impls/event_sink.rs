//! EventSink 実装
//!
//! - NoopEventSink: 何もしない
//! - ChannelEventSink: broadcast で購読者に流す（reconciliation 用）

use tokio::sync::broadcast;

use crate::domain::WorkerEvent;
use crate::ports::EventSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: WorkerEvent) {}
}

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lag (and lose events) rather than block workers.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: broadcast::Sender<WorkerEvent>,
}

impl ChannelEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: WorkerEvent) {
        // ignore send error: no subscribers
        let _ = self.tx.send(event);
    }
}
