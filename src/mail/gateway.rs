//! Mail Gateway: the single send surface used by tasks.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::transport::{MailError, MailTransport, OutgoingEmail};
use crate::config::MailConfig;
use crate::metrics::MailMetrics;
use crate::template::TemplateRenderer;

#[derive(Clone)]
pub struct MailGateway {
    transport: Arc<dyn MailTransport>,
    renderer: TemplateRenderer,
    sender_address: String,
    sender_name: String,
}

impl MailGateway {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        renderer: TemplateRenderer,
        config: &MailConfig,
    ) -> Self {
        Self {
            transport,
            renderer,
            sender_address: config.sender_address.trim().to_string(),
            sender_name: config.sender_name.clone(),
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Send a message. Returns true iff the provider accepted it.
    ///
    /// Provider faults propagate as `Err`; bodies are never logged.
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> Result<bool, MailError> {
        if self.sender_address.is_empty() {
            return Err(MailError::Config(
                "mail.sender_address is not configured".to_string(),
            ));
        }

        let to = to.trim();
        if to.is_empty() {
            return Err(MailError::InvalidMessage(
                "recipient address is empty".to_string(),
            ));
        }

        let email = OutgoingEmail {
            from_name: self.sender_name.clone(),
            from_address: self.sender_address.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            text_body: text_body.to_string(),
            html_body: html_body.map(str::to_string),
        };

        tracing::debug!(to = %to, subject = %subject, "Sending email");

        let transport = self.transport.name();
        match self.transport.deliver(&email).await {
            Ok(true) => {
                MailMetrics::record_accepted(transport);
                tracing::info!(to = %to, transport, "Email accepted by provider");
                Ok(true)
            }
            Ok(false) => {
                MailMetrics::record_rejected(transport);
                tracing::warn!(to = %to, transport, "Email not accepted by provider");
                Ok(false)
            }
            Err(e) => {
                MailMetrics::record_failed(transport);
                tracing::warn!(to = %to, transport, error = %e, "Email send failed");
                Err(e)
            }
        }
    }

    /// Render `template` with `context`, then send HTML plus text fallback.
    pub async fn send_templated(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, MailError> {
        let rendered = self.renderer.render(template, context)?;
        self.send_email(to, subject, &rendered.text, Some(&rendered.html))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MemoryTransport;
    use crate::template::{TemplateError, TemplateStore};
    use serde_json::json;

    fn config(sender: &str) -> MailConfig {
        MailConfig {
            sender_address: sender.to_string(),
            ..Default::default()
        }
    }

    fn gateway(sender: &str) -> (MailGateway, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let gateway = MailGateway::new(
            transport.clone(),
            TemplateRenderer::default(),
            &config(sender),
        );
        (gateway, transport)
    }

    #[tokio::test]
    async fn test_send_email_accepted() {
        let (gateway, transport) = gateway("no-reply@vetorial.example");

        let accepted = gateway
            .send_email("ana@example.com", "Assunto", "texto", Some("<p>texto</p>"))
            .await
            .unwrap();

        assert!(accepted);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from_address, "no-reply@vetorial.example");
        assert_eq!(sent[0].from_name, "Contabilidade Vetorial");
        assert_eq!(sent[0].html_body.as_deref(), Some("<p>texto</p>"));
    }

    #[tokio::test]
    async fn test_missing_sender_is_config_error() {
        let (gateway, transport) = gateway("   ");

        let result = gateway.send_email("ana@example.com", "s", "t", None).await;
        assert!(matches!(result, Err(MailError::Config(_))));
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_recipient_never_reaches_transport() {
        let (gateway, transport) = gateway("no-reply@vetorial.example");

        let result = gateway.send_email("", "s", "t", None).await;
        assert!(matches!(result, Err(MailError::InvalidMessage(_))));
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let (gateway, transport) = gateway("no-reply@vetorial.example");
        transport.fail_next(1, "connection refused");

        let result = gateway.send_email("ana@example.com", "s", "t", None).await;
        assert!(matches!(result, Err(MailError::Transport(_))));

        transport.reject_next(1);
        let result = gateway.send_email("ana@example.com", "s", "t", None).await;
        assert!(!result.unwrap());
    }

    #[tokio::test]
    async fn test_send_templated_derives_text_part() {
        let (gateway, transport) = gateway("no-reply@vetorial.example");
        gateway
            .renderer
            .store()
            .register(crate::template::EmailTemplate::new(
                "emails/teste",
                "<p>Olá, <strong>{{nome}}</strong></p>",
            ))
            .unwrap();

        let mut ctx = Map::new();
        ctx.insert("nome".to_string(), json!("Ana"));

        assert!(gateway
            .send_templated("ana@example.com", "Oi", "emails/teste", &ctx)
            .await
            .unwrap());

        let sent = transport.sent();
        assert_eq!(sent[0].text_body, "Olá, Ana");
        assert_eq!(
            sent[0].html_body.as_deref(),
            Some("<p>Olá, <strong>Ana</strong></p>")
        );
    }

    #[tokio::test]
    async fn test_send_templated_unknown_template() {
        let transport = Arc::new(MemoryTransport::new());
        let gateway = MailGateway::new(
            transport.clone(),
            TemplateRenderer::new(Arc::new(TemplateStore::new())),
            &config("no-reply@vetorial.example"),
        );

        let result = gateway
            .send_templated("ana@example.com", "s", "emails/missing", &Map::new())
            .await;
        assert!(matches!(
            result,
            Err(MailError::Template(TemplateError::NotFound(_)))
        ));
        assert_eq!(transport.send_count(), 0);
    }
}
