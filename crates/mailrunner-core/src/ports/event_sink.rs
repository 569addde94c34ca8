//! EventSink port - worker イベントの出口

use crate::domain::WorkerEvent;

/// Receives worker events. Must not block: it is called from inside the
/// worker loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WorkerEvent);
}
