//! Outbound message delivery.
//!
//! The default sender for local dev is `LogMailer`, which logs the message and
//! hands back a generated message id.

use anyhow::Result;
use tracing::info;
use ulid::Ulid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// Message carrying an email confirmation link.
    #[must_use]
    pub fn confirmation(to_email: &str, name: &str, link: &str) -> Self {
        Self {
            to_email: to_email.to_string(),
            subject: "Confirm your email address".to_string(),
            body: format!(
                "Hello {name},\n\nOpen the link below to confirm your email address:\n\n{link}\n"
            ),
        }
    }
}

/// Message delivery abstraction.
pub trait Mailer: Send + Sync {
    /// Deliver a message and return its id, or an error on transport failure.
    fn send(&self, message: &MailMessage) -> Result<String>;
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<String> {
        let message_id = Ulid::new().to_string();
        info!(
            message_id = %message_id,
            to_email = %message.to_email,
            subject = %message.subject,
            "mail send stub"
        );
        Ok(message_id)
    }
}
