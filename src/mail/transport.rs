//! Transport seam between the gateway and a mail provider.

use async_trait::async_trait;
use thiserror::Error;

use crate::template::TemplateError;

/// Errors raised while sending mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// Sender or transport configuration is unusable
    #[error("Mail configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Message could not be built (bad address, bad header)
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Provider unreachable or failed mid-conversation
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail provider timed out: {0}")]
    Timeout(String),
}

/// A fully rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from_name: String,
    pub from_address: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Hand the message to the provider.
    ///
    /// `Ok(true)` means the provider accepted it for delivery, `Ok(false)`
    /// means the provider answered and refused it.
    async fn deliver(&self, email: &OutgoingEmail) -> Result<bool, MailError>;

    fn name(&self) -> &'static str;
}
