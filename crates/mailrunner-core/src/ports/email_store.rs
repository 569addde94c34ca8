//! EmailStore port - 共有ジョブストア（正本）
//!
//! 複数 worker / 複数プロセスから同時に叩かれる前提。
//! 排他は呼び出し側のロックではなく、ここの `claim` の原子性で保証する。

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{DeliveryOutcome, EmailId, EmailRecord, StoreError, WorkerId};
use crate::observability::StoreCounts;

/// Shared, concurrently accessed source of truth for email records.
///
/// # Contract
/// - `claim` is a single atomic step: select one `Pending` record, mark it
///   `Leased` by `worker` with a timestamp, return it. Two concurrent calls
///   never return the same record. `Ok(None)` means nothing is pending.
/// - `release` always clears the lease. `Delivered` marks the record
///   delivered; `Failed` puts it back to `Pending` or marks it `Failed`,
///   per the store's own retry-exhaustion policy.
/// - `reap_expired_leases` is the companion sweep that recovers leases
///   orphaned by a failed release or a crashed worker.
#[async_trait]
pub trait EmailStore: Send + Sync {
    async fn claim(&self, worker: &WorkerId) -> Result<Option<EmailRecord>, StoreError>;

    async fn release(
        &self,
        record: &EmailRecord,
        outcome: &DeliveryOutcome,
    ) -> Result<(), StoreError>;

    /// Return every lease older than `ttl` to `Pending`.
    async fn reap_expired_leases(&self, ttl: Duration) -> Result<Vec<EmailId>, StoreError>;

    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}
