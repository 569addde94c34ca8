//! App - アプリケーション層
//!
//! ports を組み合わせて worker pool を構成する。
//!
//! # 主要コンポーネント
//! - **PoolConfig**: 設定と起動時検証
//! - **Worker**: lease-and-release ループ（claim → send → release → sleep）
//! - **WorkerPool**: n 個の Worker の起動と一括停止（drain）
//! - **ReaperLoop**: 期限切れ lease の回収

pub mod config;
pub mod pool;
pub mod reaper_loop;
pub mod worker;

pub use self::config::{ConfigError, PoolConfig, StoreConfig};
pub use self::pool::{PoolError, WorkerPool};
pub use self::reaper_loop::ReaperLoop;
pub use self::worker::{CycleOutcome, Worker, WorkerState};

use tokio::sync::watch;

/// Shutdown has been broadcast, or the pool that owned the sender is gone.
pub(crate) fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}
