//! Mailer port - 実際の配送（SMTP など）を担う外部 collaborator

use async_trait::async_trait;

use crate::domain::{DeliveryError, Email};

/// Delivers one email. Treated as a black box by the worker.
///
/// No timeout is imposed by the caller: a send that never returns stalls
/// the calling worker (and only that worker).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), DeliveryError>;
}
