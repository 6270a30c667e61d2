//! Outgoing email collaborator.

use crate::error::Result;

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text_body: String,
    /// HTML body.
    pub html_body: String,
    /// Sender address.
    pub sender: String,
}

/// Delivers email on behalf of the core.
pub trait Mailer: Send + Sync {
    /// Send one message.
    fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Mailer that writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.recipient,
            from = %email.sender,
            subject = %email.subject,
            "Outgoing email:\n{}",
            email.text_body
        );
        Ok(())
    }
}
