//! Email record: payload + lease state, as held by a store.
//!
//! Design:
//! - This is the "single source of truth" for one email's delivery state.
//! - `status` と `lease` は private。遷移メソッド経由でしか変えられないので
//!   「Leased ⇔ lease holder が Some」の不変条件が崩れない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::errors::StoreError;
use super::ids::{EmailId, WorkerId};

/// Delivery status.
///
/// State transitions:
/// - Pending -> Leased (claim)
/// - Leased -> Delivered (release, success)
/// - Leased -> Pending (release, failure with attempts left / lease expired)
/// - Leased -> Failed (release, failure with attempts exhausted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Leased,
    Delivered,
    Failed,
}

/// Exclusive, time-attributed claim by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub holder: WorkerId,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: EmailId,
    pub email: Email,
    status: EmailStatus,
    lease: Option<Lease>,

    /// Number of claims so far (including the current one while leased).
    pub tries: u32,

    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailRecord {
    pub fn new(id: EmailId, email: Email, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            status: EmailStatus::Pending,
            lease: None,
            tries: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> EmailStatus {
        self.status
    }

    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    pub fn lease_holder(&self) -> Option<&WorkerId> {
        self.lease.as_ref().map(|l| &l.holder)
    }

    /// Leased iff a holder is recorded.
    pub fn lease_is_consistent(&self) -> bool {
        (self.status == EmailStatus::Leased) == self.lease.is_some()
    }

    /// Pending -> Leased.
    pub fn claim(&mut self, worker: WorkerId, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.expect_status(EmailStatus::Pending, EmailStatus::Leased)?;
        self.status = EmailStatus::Leased;
        self.lease = Some(Lease {
            holder: worker,
            acquired_at: now,
        });
        self.tries += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Leased -> Delivered.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.leave_lease(EmailStatus::Delivered, now)?;
        self.last_error = None;
        Ok(())
    }

    /// Leased -> Pending, keeping the failure reason for the next attempt.
    pub fn mark_retry(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.leave_lease(EmailStatus::Pending, now)?;
        self.last_error = Some(reason);
        Ok(())
    }

    /// Leased -> Failed (no attempts left).
    pub fn mark_failed(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.leave_lease(EmailStatus::Failed, now)?;
        self.last_error = Some(reason);
        Ok(())
    }

    /// Leased -> Pending after the holder went silent.
    pub fn expire_lease(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let holder = self.lease_holder().copied();
        self.leave_lease(EmailStatus::Pending, now)?;
        if let Some(holder) = holder {
            self.last_error = Some(format!("lease held by {holder} expired"));
        }
        Ok(())
    }

    fn leave_lease(&mut self, to: EmailStatus, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.expect_status(EmailStatus::Leased, to)?;
        self.status = to;
        self.lease = None;
        self.updated_at = now;
        Ok(())
    }

    fn expect_status(&self, expected: EmailStatus, to: EmailStatus) -> Result<(), StoreError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition {
                email_id: self.id.clone(),
                from: self.status,
                to,
            })
        }
    }
}
