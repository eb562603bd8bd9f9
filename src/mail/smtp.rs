//! SMTP transport using lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::transport::{MailError, MailTransport, OutgoingEmail};
use crate::config::MailConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(20);

/// TLS mode for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// No TLS, only for local relays
    None,
    /// Upgrade to TLS after connecting (port 587)
    StartTls,
    /// Implicit TLS from the first byte (port 465)
    Tls,
}

impl TlsMode {
    pub fn parse(value: &str) -> Result<Self, MailError> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(TlsMode::None),
            "starttls" => Ok(TlsMode::StartTls),
            "tls" => Ok(TlsMode::Tls),
            other => Err(MailError::Config(format!("unknown smtp_tls mode: {}", other))),
        }
    }
}

pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let host = config.smtp_host.as_str();

        let builder = match TlsMode::parse(&config.smtp_tls)? {
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailError::Config(e.to_string()))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| MailError::Config(e.to_string()))?,
        };

        let mut builder = builder.port(config.smtp_port).timeout(Some(SMTP_TIMEOUT));
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            tls = %config.smtp_tls,
            "SMTP transport configured"
        );

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, MailError> {
    let address: Address = address
        .trim()
        .parse()
        .map_err(|e| MailError::InvalidMessage(format!("invalid address '{}': {}", address, e)))?;
    Ok(Mailbox::new(
        name.filter(|n| !n.is_empty()).map(str::to_string),
        address,
    ))
}

/// Build a multipart/alternative message, or text/plain when there is no HTML part.
pub fn build_message(email: &OutgoingEmail) -> Result<Message, MailError> {
    let builder = Message::builder()
        .from(mailbox(Some(&email.from_name), &email.from_address)?)
        .to(mailbox(None, &email.to)?)
        .subject(email.subject.clone());

    let message = match &email.html_body {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            email.text_body.clone(),
            html.clone(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body.clone()),
    };

    message.map_err(|e| MailError::InvalidMessage(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<bool, MailError> {
        let message = build_message(email)?;

        match self.transport.send(message).await {
            Ok(response) => Ok(response.is_positive()),
            Err(e) if e.is_permanent() => {
                tracing::warn!(to = %email.to, error = %e, "SMTP server refused message");
                Ok(false)
            }
            Err(e) if e.is_timeout() => Err(MailError::Timeout(e.to_string())),
            Err(e) => Err(MailError::Transport(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
