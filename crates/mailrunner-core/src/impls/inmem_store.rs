//! InMemoryEmailStore - 開発・テスト用の正本
//!
//! # 実装詳細
//! - `records`: 全レコード（single source of truth）
//! - `pending`: claim 候補の EmailId を FIFO で保持
//! - claim / release / reap はすべて 1 回のロック内で完結する
//!   （read と write を分けると 2 worker が同じレコードを掴める）
//! - ロックを跨いで await しない

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app::config::StoreConfig;
use crate::domain::{
    DeliveryOutcome, Email, EmailId, EmailRecord, EmailStatus, StoreError, WorkerId,
};
use crate::observability::StoreCounts;
use crate::ports::{Clock, EmailStore, IdGenerator, SystemClock, SystemIdGenerator};

/// Store-owned retry-exhaustion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Claims allowed before a failed delivery becomes terminal.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Default)]
struct InMemoryState {
    records: HashMap<EmailId, EmailRecord>,
    pending: VecDeque<EmailId>,
}

impl InMemoryState {
    fn counts(&self) -> StoreCounts {
        let mut counts = StoreCounts::default();
        for record in self.records.values() {
            counts.record(record.status());
        }
        counts
    }
}

pub struct InMemoryEmailStore {
    namespace: String,
    state: Mutex<InMemoryState>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    retry_policy: RetryPolicy,
}

impl InMemoryEmailStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock<C: Clock + Clone + 'static>(config: &StoreConfig, clock: C) -> Self {
        Self {
            namespace: config.database.clone(),
            state: Mutex::new(InMemoryState::default()),
            ids: Arc::new(SystemIdGenerator::new(clock.clone())),
            clock: Arc::new(clock),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Producer side: validate and enqueue a new `Pending` email.
    pub async fn insert(&self, email: Email) -> Result<EmailId, StoreError> {
        email.validate()?;

        let id = self.ids.generate_email_id();
        let record = EmailRecord::new(id.clone(), email, self.clock.now());

        let mut state = self.state.lock().await;
        state.records.insert(id.clone(), record);
        state.pending.push_back(id.clone());
        Ok(id)
    }

    pub async fn get(&self, id: &EmailId) -> Option<EmailRecord> {
        let state = self.state.lock().await;
        state.records.get(id).cloned()
    }

    /// All records, oldest first.
    pub async fn snapshot(&self) -> Vec<EmailRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<EmailRecord> = state.records.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }
}

#[async_trait]
impl EmailStore for InMemoryEmailStore {
    async fn claim(&self, worker: &WorkerId) -> Result<Option<EmailRecord>, StoreError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = self.clock.now();

        // pending には古い ID が残っていることがある（reap 済みなど）ので状態を見て読み飛ばす
        while let Some(id) = state.pending.pop_front() {
            if let Some(record) = state.records.get_mut(&id)
                && record.status() == EmailStatus::Pending
            {
                record.claim(*worker, now)?;
                tracing::debug!(
                    namespace = %self.namespace,
                    email_id = %id,
                    worker_id = %worker,
                    tries = record.tries,
                    "email leased"
                );
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn release(
        &self,
        record: &EmailRecord,
        outcome: &DeliveryOutcome,
    ) -> Result<(), StoreError> {
        let target = match outcome {
            DeliveryOutcome::Delivered => EmailStatus::Delivered,
            DeliveryOutcome::Failed { .. } => EmailStatus::Pending,
        };
        let Some(worker_id) = record.lease_holder().copied() else {
            return Err(StoreError::InvalidTransition {
                email_id: record.id.clone(),
                from: record.status(),
                to: target,
            });
        };

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = self.clock.now();

        let stored = state
            .records
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::NotFound(record.id.clone()))?;

        if stored.status() != EmailStatus::Leased || stored.lease() != record.lease() {
            return Err(StoreError::LeaseLost {
                email_id: record.id.clone(),
                worker_id,
            });
        }

        match outcome {
            DeliveryOutcome::Delivered => stored.mark_delivered(now)?,
            DeliveryOutcome::Failed { reason } => {
                if stored.tries >= self.retry_policy.max_attempts {
                    stored.mark_failed(reason.clone(), now)?;
                } else {
                    stored.mark_retry(reason.clone(), now)?;
                    state.pending.push_back(record.id.clone());
                }
            }
        }

        tracing::debug!(
            namespace = %self.namespace,
            email_id = %record.id,
            worker_id = %worker_id,
            status = ?stored.status(),
            "email released"
        );
        Ok(())
    }

    async fn reap_expired_leases(&self, ttl: Duration) -> Result<Vec<EmailId>, StoreError> {
        // ttl が chrono で表せないほど長いなら、期限切れは存在しない
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return Ok(Vec::new());
        };

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = self.clock.now();

        let mut reaped = Vec::new();
        for record in state.records.values_mut() {
            let expired = record
                .lease()
                .and_then(|lease| lease.acquired_at.checked_add_signed(ttl))
                .is_some_and(|deadline| deadline <= now);
            if expired {
                record.expire_lease(now)?;
                reaped.push(record.id.clone());
            }
        }
        reaped.sort();
        state.pending.extend(reaped.iter().cloned());
        Ok(reaped)
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let state = self.state.lock().await;
        Ok(state.counts())
    }
}
