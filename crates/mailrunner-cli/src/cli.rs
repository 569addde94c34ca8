use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mailrunner_core::app::{PoolConfig, StoreConfig};

/// Poll the email store with a pool of workers until SIGINT/SIGTERM.
#[derive(Debug, Parser)]
#[command(name = "mailrunner", version)]
pub struct Cli {
    /// Store host
    #[arg(long, env = "DB_HOST")]
    pub db_host: String,

    /// Store port
    #[arg(long, env = "DB_PORT")]
    pub db_port: u16,

    /// Store database / namespace
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Seconds each worker sleeps between two polls
    #[arg(long, env = "WORKER_SLEEP", default_value_t = 2)]
    pub worker_sleep: u64,

    /// Number of workers
    #[arg(long, env = "POOL_SIZE", default_value_t = 5)]
    pub pool_size: usize,

    /// Seconds after which a lease is considered orphaned
    #[arg(long, env = "LEASE_TTL", default_value_t = 300)]
    pub lease_ttl: u64,

    /// Seconds between two lease sweeps
    #[arg(long, env = "REAP_INTERVAL", default_value_t = 30)]
    pub reap_interval: u64,

    /// Insert N demo emails into the in-memory store before starting
    #[arg(long, default_value_t = 0)]
    pub seed: usize,

    /// Insert the emails from a JSON array file before starting
    #[arg(long)]
    pub seed_file: Option<PathBuf>,
}

impl Cli {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            store: StoreConfig {
                host: self.db_host.clone(),
                port: self.db_port,
                database: self.db_name.clone(),
            },
            worker_sleep: Duration::from_secs(self.worker_sleep),
            pool_size: self.pool_size,
            lease_ttl: Duration::from_secs(self.lease_ttl),
            reap_interval: Duration::from_secs(self.reap_interval),
        }
    }
}
