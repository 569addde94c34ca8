//! Errors - エラー型と分類
//!
//! 各 collaborator ごとに 1 つの enum を持つ。worker はどれも握りつぶさず
//! ログに残すが、プロセスを落とすのは起動時の `IdentityError` だけ。

use thiserror::Error;

use super::ids::{EmailId, WorkerId};
use super::record::EmailStatus;

/// Errors surfaced by an `EmailStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (I/O, connection refused, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("email not found: {0}")]
    NotFound(EmailId),

    /// The record is no longer leased by the releasing worker
    /// (it was swept back to pending, or re-claimed by someone else).
    #[error("lease on {email_id} is no longer held by worker {worker_id}")]
    LeaseLost { email_id: EmailId, worker_id: WorkerId },

    #[error("invalid transition for {email_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        email_id: EmailId,
        from: EmailStatus,
        to: EmailStatus,
    },

    #[error("invalid email: {0}")]
    Invalid(#[from] ValidationError),
}

impl StoreError {
    /// Transient errors are worth another attempt on a later cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Error returned by a `Mailer` when a send attempt fails.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("recipient rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Worker identity could not be generated.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("random source exhausted: {0}")]
    RandomSource(String),
}

/// Producer-side validation of an `Email`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("subject is {len} chars, max is {max}")]
    SubjectTooLong { len: usize, max: usize },

    #[error("body is {len} bytes, max is {max}")]
    BodyTooLong { len: usize, max: usize },

    #[error("email has no recipients")]
    NoRecipients,

    #[error("{count} recipients, max is {max}")]
    TooManyRecipients { count: usize, max: usize },

    #[error("invalid email address: {0:?}")]
    InvalidAddress(String),
}
