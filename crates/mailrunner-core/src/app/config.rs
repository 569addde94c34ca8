//! PoolConfig - worker pool の設定
//!
//! 読み込み（env / flags）は Supervisor 側の責務。ここでは値の入れ物と
//! 起動時検証（Fail-fast）だけを持つ。

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the shared store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    /// Logical database / namespace name.
    pub database: String,
}

impl StoreConfig {
    /// `host:port`
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            database: "mailrunner".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub store: StoreConfig,

    /// Pause between two cycles of one worker, whether or not work was found.
    pub worker_sleep: Duration,

    /// Number of workers.
    pub pool_size: usize,

    /// Leases older than this are considered orphaned and swept back to pending.
    /// Must comfortably exceed the slowest expected delivery.
    pub lease_ttl: Duration,

    /// How often the sweep runs.
    pub reap_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            worker_sleep: Duration::from_secs(2),
            pool_size: 5,
            lease_ttl: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pool_size must be at least 1")]
    EmptyPool,

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("lease_ttl ({lease_ttl:?}) must be longer than worker_sleep ({worker_sleep:?})")]
    LeaseTtlTooShort {
        lease_ttl: Duration,
        worker_sleep: Duration,
    },

    #[error("worker_sleep must be non-zero")]
    ZeroWorkerSleep,

    #[error("reap_interval must be non-zero")]
    ZeroReapInterval,
}

impl PoolConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_worker_sleep(mut self, worker_sleep: Duration) -> Self {
        self.worker_sleep = worker_sleep;
        self
    }

    pub fn with_lease_ttl(mut self, lease_ttl: Duration) -> Self {
        self.lease_ttl = lease_ttl;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if self.store.host.trim().is_empty() {
            return Err(ConfigError::Missing("store.host"));
        }
        if self.store.database.trim().is_empty() {
            return Err(ConfigError::Missing("store.database"));
        }
        // 0 だと store が落ちている間に claim を連打してしまう
        if self.worker_sleep.is_zero() {
            return Err(ConfigError::ZeroWorkerSleep);
        }
        if self.lease_ttl <= self.worker_sleep {
            return Err(ConfigError::LeaseTtlTooShort {
                lease_ttl: self.lease_ttl,
                worker_sleep: self.worker_sleep,
            });
        }
        if self.reap_interval.is_zero() {
            return Err(ConfigError::ZeroReapInterval);
        }
        Ok(())
    }
}
