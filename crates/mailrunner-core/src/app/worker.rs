//! Worker - lease-and-release ループ
//!
//! # フロー（1 サイクル）
//! 1. EmailStore::claim() で 1 件 lease（なければ NoneAvailable）
//! 2. Mailer::send() で配送
//! 3. EmailStore::release() で結果を反映し lease を外す
//! 4. worker_sleep だけ眠る
//!
//! shutdown はループ先頭でだけ判定する。claim → release の途中では止まらない
//! ので、止めたせいで Leased のまま残るレコードは出ない。
//!
//! # Shutdown latency
//! 眠っている worker は shutdown で即座に起きる。処理中の worker は今の
//! サイクルを最後まで終えてから抜ける。最悪でも
//! `worker_sleep + 1 サイクル（claim + send + release）` で止まる。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::shutdown_requested;
use crate::domain::{DeliveryOutcome, EmailId, StoreError, WorkerEvent, WorkerId};
use crate::ports::{EmailStore, EventSink, Mailer};

/// Where a worker is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Idle,
    Claiming,
    Processing,
    Releasing,
    Stopped,
}

/// Result of one `run_cycle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NoneAvailable,
    ClaimFailed,
    Delivered(EmailId),
    DeliveryFailed(EmailId),
    /// Processing finished but the release did not go through; the record
    /// is still leased at the store.
    ReleaseFailed(EmailId),
}

pub struct Worker {
    id: WorkerId,
    store: Arc<dyn EmailStore>,
    mailer: Arc<dyn Mailer>,
    events: Arc<dyn EventSink>,
    sleep: Duration,
    state: watch::Sender<WorkerState>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        store: Arc<dyn EmailStore>,
        mailer: Arc<dyn Mailer>,
        events: Arc<dyn EventSink>,
        sleep: Duration,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            id,
            store,
            mailer,
            events,
            sleep,
            state,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Follow this worker's state from outside its task.
    pub fn state_watch(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Loop until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(sleep_secs = self.sleep.as_secs_f64(), "starting processing loop");
        self.events.emit(WorkerEvent::Started { worker_id: self.id });

        loop {
            if shutdown_requested(&shutdown) {
                break;
            }

            tracing::debug!("waking up and looking for emails to send");
            self.run_cycle().await;

            tracing::debug!(sleep_secs = self.sleep.as_secs_f64(), "going back to sleep");
            // 眠っている間だけ shutdown と競合させる
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(self.sleep) => {}
            }
        }

        self.transition(WorkerState::Stopped);
        self.events.emit(WorkerEvent::Stopped { worker_id: self.id });
        tracing::info!("processing loop finished");
    }

    /// One claim → send → release pass. Never panics on collaborator errors.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let worker_id = self.id;

        self.transition(WorkerState::Claiming);
        let record = match self.store.claim(&worker_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("no email ready to send");
                self.events.emit(WorkerEvent::NoneAvailable { worker_id });
                self.transition(WorkerState::Idle);
                return CycleOutcome::NoneAvailable;
            }
            Err(err) => {
                // すぐには再試行しない。落ちている store を叩き続けないため
                if err.is_transient() {
                    tracing::warn!(error = %err, "error while fetching emails");
                } else {
                    tracing::error!(error = %err, "store refused the claim");
                }
                self.events.emit(WorkerEvent::ClaimFailed {
                    worker_id,
                    error: err.to_string(),
                });
                self.transition(WorkerState::Idle);
                return CycleOutcome::ClaimFailed;
            }
        };

        let email_id = record.id.clone();
        tracing::info!(email_id = %email_id, tries = record.tries, "got email");
        self.events.emit(WorkerEvent::Claimed {
            worker_id,
            email_id: email_id.clone(),
        });

        self.transition(WorkerState::Processing);
        let outcome = DeliveryOutcome::from(self.mailer.send(&record.email).await);

        self.transition(WorkerState::Releasing);
        tracing::debug!(email_id = %email_id, "releasing email");
        let result = match self.store.release(&record, &outcome).await {
            Ok(()) => match &outcome {
                DeliveryOutcome::Delivered => {
                    tracing::info!(email_id = %email_id, "email delivered");
                    self.events.emit(WorkerEvent::Delivered {
                        worker_id,
                        email_id: email_id.clone(),
                    });
                    CycleOutcome::Delivered(email_id)
                }
                DeliveryOutcome::Failed { reason } => {
                    tracing::warn!(email_id = %email_id, reason = %reason, "delivery failed");
                    self.events.emit(WorkerEvent::DeliveryFailed {
                        worker_id,
                        email_id: email_id.clone(),
                        reason: reason.clone(),
                    });
                    CycleOutcome::DeliveryFailed(email_id)
                }
            },
            Err(err) => {
                // release をここで粘って再試行すると後続が詰まる。
                // lease の回収は store 側の sweep に任せる
                if matches!(err, StoreError::LeaseLost { .. }) {
                    tracing::error!(
                        email_id = %email_id,
                        delivered = outcome.is_success(),
                        reconciliation_required = true,
                        error = %err,
                        "lease was swept before release; email is back in rotation"
                    );
                } else {
                    tracing::error!(
                        email_id = %email_id,
                        delivered = outcome.is_success(),
                        reconciliation_required = true,
                        error = %err,
                        "could not release email; lease is orphaned until swept"
                    );
                }
                self.events.emit(WorkerEvent::ReleaseFailed {
                    worker_id,
                    email_id: email_id.clone(),
                    delivered: outcome.is_success(),
                    error: err.to_string(),
                });
                CycleOutcome::ReleaseFailed(email_id)
            }
        };

        self.transition(WorkerState::Idle);
        result
    }

    fn transition(&self, next: WorkerState) {
        let prev = self.state.send_replace(next);
        tracing::trace!(from = ?prev, to = ?next, "worker state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    use crate::domain::EmailStatus;
    use crate::impls::InMemoryEmailStore;
    use crate::testing::{
        FlakyStore, GatedMailer, RecordingSink, ScriptedMailer, sample_email, store_config,
    };

    struct Fixture {
        store: Arc<FlakyStore>,
        mailer: Arc<ScriptedMailer>,
        sink: Arc<RecordingSink>,
    }

    impl Fixture {
        fn new(mailer: ScriptedMailer) -> Self {
            Self {
                store: Arc::new(FlakyStore::new(InMemoryEmailStore::new(&store_config()))),
                mailer: Arc::new(mailer),
                sink: Arc::new(RecordingSink::default()),
            }
        }

        fn worker(&self, sleep: Duration) -> Worker {
            Worker::new(
                WorkerId::generate().unwrap(),
                self.store.clone(),
                self.mailer.clone(),
                self.sink.clone(),
                sleep,
            )
        }
    }

    #[tokio::test]
    async fn empty_poll_returns_none_available() {
        let fx = Fixture::new(ScriptedMailer::succeeding());
        let mut worker = fx.worker(Duration::from_millis(10));

        assert_eq!(worker.run_cycle().await, CycleOutcome::NoneAvailable);
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(
            fx.sink.count(|e| matches!(e, WorkerEvent::NoneAvailable { .. })),
            1
        );
        assert_eq!(fx.mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn successful_cycle_delivers_and_releases() {
        let fx = Fixture::new(ScriptedMailer::succeeding());
        let id = fx.store.inner().insert(sample_email(1)).await.unwrap();
        let mut worker = fx.worker(Duration::from_millis(10));

        assert_eq!(worker.run_cycle().await, CycleOutcome::Delivered(id.clone()));

        let stored = fx.store.inner().get(&id).await.unwrap();
        assert_eq!(stored.status(), EmailStatus::Delivered);
        assert!(stored.lease_holder().is_none());
        assert_eq!(fx.mailer.sent_count(), 1);
        assert_eq!(worker.state(), WorkerState::Idle);

        let events = fx.sink.events();
        assert!(matches!(events[0], WorkerEvent::Claimed { .. }));
        assert!(matches!(events[1], WorkerEvent::Delivered { .. }));
        assert!(events.iter().all(|e| e.worker_id() == &worker.id()));
    }

    #[tokio::test]
    async fn failed_delivery_is_released_back_to_pending() {
        let fx = Fixture::new(ScriptedMailer::failing("mailbox full"));
        let id = fx.store.inner().insert(sample_email(1)).await.unwrap();
        let mut worker = fx.worker(Duration::from_millis(10));

        assert_eq!(worker.run_cycle().await, CycleOutcome::DeliveryFailed(id.clone()));

        let stored = fx.store.inner().get(&id).await.unwrap();
        assert_eq!(stored.status(), EmailStatus::Pending);
        assert!(stored.lease_holder().is_none());
        assert!(stored.last_error.as_deref().unwrap().contains("mailbox full"));
        // the worker does not retry in place
        assert_eq!(fx.mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn claim_error_skips_processing() {
        let fx = Fixture::new(ScriptedMailer::succeeding());
        fx.store.inner().insert(sample_email(1)).await.unwrap();
        fx.store.fail_claims(true);
        let mut worker = fx.worker(Duration::from_millis(10));

        assert_eq!(worker.run_cycle().await, CycleOutcome::ClaimFailed);
        assert_eq!(fx.mailer.sent_count(), 0);
        assert_eq!(fx.store.inner().counts().await.unwrap().pending, 1);
        assert_eq!(
            fx.sink.count(|e| matches!(e, WorkerEvent::ClaimFailed { .. })),
            1
        );
    }

    #[tokio::test]
    async fn release_error_is_surfaced_for_reconciliation() {
        let fx = Fixture::new(ScriptedMailer::succeeding());
        let id = fx.store.inner().insert(sample_email(1)).await.unwrap();
        fx.store.fail_releases(true);
        let mut worker = fx.worker(Duration::from_millis(10));

        assert_eq!(worker.run_cycle().await, CycleOutcome::ReleaseFailed(id.clone()));
        assert_eq!(worker.state(), WorkerState::Idle);

        // the record is orphaned at the store until a sweep recovers it
        let stored = fx.store.inner().get(&id).await.unwrap();
        assert_eq!(stored.status(), EmailStatus::Leased);

        let orphaned: Vec<WorkerEvent> = fx
            .sink
            .events()
            .into_iter()
            .filter(WorkerEvent::requires_reconciliation)
            .collect();
        assert_eq!(orphaned.len(), 1);
        assert!(matches!(
            &orphaned[0],
            WorkerEvent::ReleaseFailed { delivered: true, email_id, .. } if *email_id == id
        ));

        // next cycle carries on normally
        fx.store.fail_releases(false);
        assert_eq!(worker.run_cycle().await, CycleOutcome::NoneAvailable);
    }

    #[tokio::test]
    async fn release_after_sweep_reports_lost_lease() {
        let store = Arc::new(InMemoryEmailStore::new(&store_config()));
        let mailer = Arc::new(GatedMailer::default());
        let sink = Arc::new(RecordingSink::default());
        let id = store.insert(sample_email(1)).await.unwrap();
        let mut worker = Worker::new(
            WorkerId::generate().unwrap(),
            store.clone(),
            mailer.clone(),
            sink.clone(),
            Duration::from_millis(10),
        );

        let cycle = tokio::spawn(async move { worker.run_cycle().await });
        mailer.wait_entered().await;

        // 送信中に lease が期限切れとして回収される
        let reaped = store.reap_expired_leases(Duration::ZERO).await.unwrap();
        assert_eq!(reaped, vec![id.clone()]);
        mailer.open();

        assert_eq!(cycle.await.unwrap(), CycleOutcome::ReleaseFailed(id.clone()));
        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.status(), EmailStatus::Pending);
        assert!(stored.lease_is_consistent());
        assert!(sink.events().iter().any(|e| matches!(
            e,
            WorkerEvent::ReleaseFailed { delivered: true, error, .. } if error.contains("lease")
        )));
    }

    #[tokio::test]
    async fn unreachable_store_is_polled_once_per_sleep() {
        let fx = Fixture::new(ScriptedMailer::succeeding());
        fx.store.fail_claims(true);
        let worker = fx.worker(Duration::from_millis(50));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(worker.run(rx));
        tokio::time::sleep(Duration::from_millis(275)).await;

        let attempts = fx.store.claim_attempts.load(Ordering::SeqCst);
        // 5-6 expected; anything near a hot loop would be far higher
        assert!((3..=8).contains(&attempts), "claim attempts: {attempts}");

        let started = Instant::now();
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(
            fx.sink.count(|e| matches!(e, WorkerEvent::Stopped { .. })),
            1
        );
    }

    #[tokio::test]
    async fn run_stops_when_shutdown_sender_is_dropped() {
        let fx = Fixture::new(ScriptedMailer::succeeding());
        let worker = fx.worker(Duration::from_secs(60));
        let state = worker.state_watch();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(worker.run(rx));
        fx.sink
            .wait_for(|e| matches!(e, WorkerEvent::NoneAvailable { .. }), 1)
            .await;
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*state.borrow(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn already_cancelled_worker_never_claims() {
        let fx = Fixture::new(ScriptedMailer::succeeding());
        fx.store.inner().insert(sample_email(1)).await.unwrap();
        let worker = fx.worker(Duration::from_millis(10));
        let (_tx, rx) = watch::channel(true);

        worker.run(rx).await;

        assert_eq!(fx.store.claim_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(fx.store.inner().counts().await.unwrap().pending, 1);
    }
}
