//! Events - worker が発行するイベント
//!
//! `EventSink` へ流す。ログとは別に、外部の突き合わせ（reconciliation）
//! プロセスが購読できるようにするためのもの。

use serde::Serialize;

use super::ids::{EmailId, WorkerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    Started {
        worker_id: WorkerId,
    },
    Claimed {
        worker_id: WorkerId,
        email_id: EmailId,
    },
    /// Empty poll. Not an error.
    NoneAvailable {
        worker_id: WorkerId,
    },
    ClaimFailed {
        worker_id: WorkerId,
        error: String,
    },
    Delivered {
        worker_id: WorkerId,
        email_id: EmailId,
    },
    DeliveryFailed {
        worker_id: WorkerId,
        email_id: EmailId,
        reason: String,
    },
    /// Processing finished but the lease could not be released.
    /// The record stays leased at the store until reconciled.
    ReleaseFailed {
        worker_id: WorkerId,
        email_id: EmailId,
        delivered: bool,
        error: String,
    },
    Stopped {
        worker_id: WorkerId,
    },
}

impl WorkerEvent {
    pub fn worker_id(&self) -> &WorkerId {
        match self {
            WorkerEvent::Started { worker_id }
            | WorkerEvent::Claimed { worker_id, .. }
            | WorkerEvent::NoneAvailable { worker_id }
            | WorkerEvent::ClaimFailed { worker_id, .. }
            | WorkerEvent::Delivered { worker_id, .. }
            | WorkerEvent::DeliveryFailed { worker_id, .. }
            | WorkerEvent::ReleaseFailed { worker_id, .. }
            | WorkerEvent::Stopped { worker_id } => worker_id,
        }
    }

    pub fn requires_reconciliation(&self) -> bool {
        matches!(self, WorkerEvent::ReleaseFailed { .. })
    }
}
