use async_trait::async_trait;
use mailrunner_core::domain::{DeliveryError, Email};
use mailrunner_core::ports::Mailer;

/// Stand-in transport: logs the email instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), DeliveryError> {
        tracing::info!(
            from = %email.sender,
            recipients = email.recipients.len(),
            subject = %email.subject,
            "sending email"
        );
        Ok(())
    }
}
