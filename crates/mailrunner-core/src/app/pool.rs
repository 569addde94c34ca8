//! WorkerPool - 固定数の worker の起動と一括停止
//!
//! - `start(n)`: identity を全員分先に作ってから n 個の task を spawn する
//!   （途中で identity 生成に失敗しても、中途半端に走り出した worker は残らない）
//! - `stop()`: shutdown を 1 回だけ broadcast し、全 worker の終了を待つ
//! - WorkerPool を drop しても shutdown sender が drop されるので worker は止まる
//!   （ただし終了は待たない）

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::config::{ConfigError, PoolConfig};
use super::worker::{Worker, WorkerState};
use crate::domain::{IdentityError, WorkerId};
use crate::ports::{EmailStore, EventSink, IdGenerator, Mailer};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not generate worker identity: {0}")]
    Identity(#[from] IdentityError),
}

struct WorkerHandle {
    id: WorkerId,
    state: watch::Receiver<WorkerState>,
    /// `None` once joined.
    join: Option<JoinHandle<()>>,
}

pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Spawn `config.pool_size` workers sharing one store, one mailer and one
    /// shutdown signal. Must be called from within a tokio runtime.
    pub fn start(
        config: &PoolConfig,
        store: Arc<dyn EmailStore>,
        mailer: Arc<dyn Mailer>,
        events: Arc<dyn EventSink>,
        ids: &dyn IdGenerator,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        let worker_ids = (0..config.pool_size)
            .map(|_| ids.generate_worker_id())
            .collect::<Result<Vec<_>, _>>()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = worker_ids
            .into_iter()
            .map(|id| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&store),
                    Arc::clone(&mailer),
                    Arc::clone(&events),
                    config.worker_sleep,
                );
                let state = worker.state_watch();
                let span = tracing::info_span!("worker", worker_id = %id);
                let join = tokio::spawn(worker.run(shutdown_rx.clone()).instrument(span));
                WorkerHandle {
                    id,
                    state,
                    join: Some(join),
                }
            })
            .collect();

        tracing::info!(
            pool_size = config.pool_size,
            sleep_secs = config.worker_sleep.as_secs_f64(),
            store = %config.store.target(),
            database = %config.store.database,
            "worker pool started"
        );

        Ok(Self {
            shutdown_tx,
            workers,
        })
    }

    /// Broadcast shutdown without waiting. Returns `true` only for the call
    /// that actually flipped the signal.
    pub fn request_stop(&self) -> bool {
        self.shutdown_tx.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        })
    }

    /// Broadcast shutdown and wait until every worker has left its loop.
    ///
    /// In-flight cycles run to completion first. Calling this again after it
    /// returned is a no-op.
    pub async fn stop(&mut self) {
        if self.request_stop() {
            tracing::info!(
                workers = self.workers.len(),
                "shutdown requested, draining in-flight cycles"
            );
        }

        let mut joined = 0;
        for worker in &mut self.workers {
            // take() は await の後。途中でこの future が drop されても handle を失わない
            if let Some(join) = worker.join.as_mut() {
                if let Err(err) = join.await {
                    tracing::warn!(worker_id = %worker.id, "worker task failed: {err}");
                }
                worker.join = None;
                joined += 1;
            }
        }

        if joined > 0 {
            tracing::info!(joined, "worker pool drained");
        }
    }

    /// Receiver for companions (e.g. the lease sweep) that should stop with the pool.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_stopping(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|w| w.id).collect()
    }

    pub fn worker_states(&self) -> Vec<(WorkerId, WorkerState)> {
        self.workers
            .iter()
            .map(|w| (w.id, *w.state.borrow()))
            .collect()
    }

    /// Workers whose task has not finished yet.
    pub fn active_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.join.as_ref().is_some_and(|j| !j.is_finished()))
            .count()
    }
}
