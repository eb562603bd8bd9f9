//! Transport that only logs. Default for development.

use async_trait::async_trait;

use super::transport::{MailError, MailTransport, OutgoingEmail};

#[derive(Debug, Default)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<bool, MailError> {
        tracing::info!(
            to = %email.to,
            html = email.html_body.is_some(),
            "Email accepted by log transport (not delivered)"
        );
        tracing::debug!(subject = %email.subject, "Logged email subject");
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
