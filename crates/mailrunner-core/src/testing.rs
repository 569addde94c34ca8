//! Test doubles shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, watch};

use crate::app::StoreConfig;
use crate::domain::{
    DeliveryError, DeliveryOutcome, Email, EmailId, EmailRecord, IdentityError, StoreError,
    WorkerEvent, WorkerId,
};
use crate::impls::InMemoryEmailStore;
use crate::observability::StoreCounts;
use crate::ports::{EmailStore, EventSink, IdGenerator, Mailer};

pub fn store_config() -> StoreConfig {
    StoreConfig {
        database: "unittest".into(),
        ..StoreConfig::default()
    }
}

pub fn sample_email(n: usize) -> Email {
    Email::new("from@tester.me", format!("Subject {n}"), "buffalo".repeat(8))
        .to(format!("to{n}@unittests.com"))
        .cc("cc@unittests.com")
}

/// In-memory store whose claim/release can be made to fail on demand.
pub struct FlakyStore {
    inner: InMemoryEmailStore,
    fail_claims: AtomicBool,
    fail_releases: AtomicBool,
    pub claim_attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: InMemoryEmailStore) -> Self {
        Self {
            inner,
            fail_claims: AtomicBool::new(false),
            fail_releases: AtomicBool::new(false),
            claim_attempts: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryEmailStore {
        &self.inner
    }

    pub fn fail_claims(&self, fail: bool) {
        self.fail_claims.store(fail, Ordering::SeqCst);
    }

    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailStore for FlakyStore {
    async fn claim(&self, worker: &WorkerId) -> Result<Option<EmailRecord>, StoreError> {
        self.claim_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.claim(worker).await
    }

    async fn release(
        &self,
        record: &EmailRecord,
        outcome: &DeliveryOutcome,
    ) -> Result<(), StoreError> {
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.release(record, outcome).await
    }

    async fn reap_expired_leases(&self, ttl: Duration) -> Result<Vec<EmailId>, StoreError> {
        self.inner.reap_expired_leases(ttl).await
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.inner.counts().await
    }
}

/// Mailer that always succeeds or always fails, optionally after a delay.
pub struct ScriptedMailer {
    failure: Option<String>,
    delay: Duration,
    sent: Mutex<Vec<Email>>,
}

impl ScriptedMailer {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            delay: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::succeeding()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for ScriptedMailer {
    async fn send(&self, email: &Email) -> Result<(), DeliveryError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().unwrap().push(email.clone());
        match &self.failure {
            Some(reason) => Err(DeliveryError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Mailer that blocks every send until `open()` is called.
pub struct GatedMailer {
    entered: Notify,
    gate: watch::Sender<bool>,
}

impl Default for GatedMailer {
    fn default() -> Self {
        Self {
            entered: Notify::new(),
            gate: watch::channel(false).0,
        }
    }
}

impl GatedMailer {
    pub async fn wait_entered(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.entered.notified())
            .await
            .expect("no send started");
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }
}

#[async_trait]
impl Mailer for GatedMailer {
    async fn send(&self, _email: &Email) -> Result<(), DeliveryError> {
        let mut gate = self.gate.subscribe();
        self.entered.notify_one();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<WorkerEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<WorkerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&WorkerEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(*e)).count()
    }

    /// Wait (up to 5s) until at least `at_least` events match.
    pub async fn wait_for(&self, pred: impl Fn(&WorkerEvent) -> bool, at_least: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.count(&pred) < at_least {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for worker events");
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: WorkerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Random source that is permanently exhausted.
pub struct BrokenIdGenerator;

impl IdGenerator for BrokenIdGenerator {
    fn generate_email_id(&self) -> EmailId {
        EmailId::new("unused")
    }

    fn generate_worker_id(&self) -> Result<WorkerId, IdentityError> {
        Err(IdentityError::RandomSource("entropy pool exhausted".into()))
    }
}
