//! Mail Gateway and its transports.
//!
//! The gateway renders templates and hands messages to a `MailTransport`:
//! - `smtp`: real delivery through lettre
//! - `log`: logs the recipient and accepts (development)
//! - `memory`: records messages, with failure injection (tests)

mod gateway;
mod log_transport;
mod memory;
mod smtp;
mod transport;

use std::sync::Arc;

pub use gateway::MailGateway;
pub use log_transport::LogTransport;
pub use memory::MemoryTransport;
pub use smtp::{build_message, SmtpTransport, TlsMode};
pub use transport::{MailError, MailTransport, OutgoingEmail};

use crate::config::MailConfig;

/// Create the transport named by `mail.backend`.
pub fn create_mail_transport(config: &MailConfig) -> Result<Arc<dyn MailTransport>, MailError> {
    match config.backend.as_str() {
        "smtp" => Ok(Arc::new(SmtpTransport::from_config(config)?)),
        "log" => {
            tracing::info!("Using log mail transport (messages are not delivered)");
            Ok(Arc::new(LogTransport::new()))
        }
        "memory" => {
            tracing::info!("Using in-memory mail transport");
            Ok(Arc::new(MemoryTransport::new()))
        }
        other => Err(MailError::Config(format!(
            "unknown mail backend: {}",
            other
        ))),
    }
}
