//! ReaperLoop - Lease 期限切れの回収
//!
//! release に失敗した worker や、途中で落ちたプロセスが残した lease を
//! `EmailStore::reap_expired_leases()` で pending に戻す。
//! これが無いと orphaned lease は永遠に Leased のまま残る。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::config::PoolConfig;
use super::shutdown_requested;
use crate::domain::{EmailId, StoreError};
use crate::ports::EmailStore;

pub struct ReaperLoop {
    store: Arc<dyn EmailStore>,
    lease_ttl: Duration,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(store: Arc<dyn EmailStore>, lease_ttl: Duration, interval: Duration) -> Self {
        Self {
            store,
            lease_ttl,
            interval,
        }
    }

    pub fn from_config(store: Arc<dyn EmailStore>, config: &PoolConfig) -> Self {
        Self::new(store, config.lease_ttl, config.reap_interval)
    }

    pub async fn sweep_once(&self) -> Result<Vec<EmailId>, StoreError> {
        let reaped = self.store.reap_expired_leases(self.lease_ttl).await?;
        if !reaped.is_empty() {
            tracing::warn!(
                count = reaped.len(),
                email_ids = ?reaped,
                lease_ttl_secs = self.lease_ttl.as_secs_f64(),
                "recovered orphaned leases"
            );
        }
        Ok(reaped)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "lease sweep started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(self.interval) => {}
            }
            if shutdown_requested(&shutdown) {
                break;
            }
            if let Err(err) = self.sweep_once().await {
                tracing::warn!("lease sweep error: {err}");
            }
        }
        tracing::info!("lease sweep shutting down");
    }
}
