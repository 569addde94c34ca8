//! Email payload: what a worker hands to the `Mailer`.
//!
//! The worker core never looks inside; validation happens when a producer
//! inserts the email into a store.

use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Longest subject accepted (RFC 5322 line limit).
pub const MAX_SUBJECT_LENGTH: usize = 998;

/// Largest body accepted, in bytes.
pub const MAX_BODY_LENGTH: usize = 1024 * 1024;

/// Upper bound on to + cc + bcc.
pub const MAX_RECIPIENTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: RecipientKind,
}

impl Recipient {
    pub fn new(address: impl Into<String>, kind: RecipientKind) -> Self {
        Self {
            address: address.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub subject: String,
    pub body: String,
    #[serde(rename = "from")]
    pub sender: String,
    pub recipients: Vec<Recipient>,
}

impl Email {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            sender: sender.into(),
            recipients: Vec::new(),
        }
    }

    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(Recipient::new(address, RecipientKind::To));
        self
    }

    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(Recipient::new(address, RecipientKind::Cc));
        self
    }

    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(Recipient::new(address, RecipientKind::Bcc));
        self
    }

    /// Check size limits and address shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let subject_len = self.subject.chars().count();
        if subject_len > MAX_SUBJECT_LENGTH {
            return Err(ValidationError::SubjectTooLong {
                len: subject_len,
                max: MAX_SUBJECT_LENGTH,
            });
        }
        if self.body.len() > MAX_BODY_LENGTH {
            return Err(ValidationError::BodyTooLong {
                len: self.body.len(),
                max: MAX_BODY_LENGTH,
            });
        }
        if self.recipients.is_empty() {
            return Err(ValidationError::NoRecipients);
        }
        if self.recipients.len() > MAX_RECIPIENTS {
            return Err(ValidationError::TooManyRecipients {
                count: self.recipients.len(),
                max: MAX_RECIPIENTS,
            });
        }

        std::iter::once(self.sender.as_str())
            .chain(self.recipients.iter().map(|r| r.address.as_str()))
            .try_for_each(|address| {
                if is_plausible_address(address) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidAddress(address.to_string()))
                }
            })
    }
}

/// `local@domain.tld`, nothing fancier.
fn is_plausible_address(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
