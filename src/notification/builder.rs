//! Notification Builder: document + recipient -> NotificationRequest.

use chrono::{Datelike, Utc};
use serde_json::{json, Map, Value};

use super::request::NotificationRequest;
use crate::config::PortalConfig;
use crate::document::{Client, ClientDocument, DocumentId};
use crate::template::DOCUMENT_NOTIFICATION;

pub const SUBJECT_PREFIX: &str = "Novo documento disponível";

/// `DD/MM/YYYY HH:MM`, rendered in UTC
pub const SEND_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Stateless composer of document notifications.
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    portal: PortalConfig,
}

impl NotificationBuilder {
    pub fn new(portal: PortalConfig) -> Self {
        Self { portal }
    }

    /// Authenticated document listing, e.g. `https://portal/documents/`.
    pub fn portal_url(&self) -> String {
        join_url(&self.portal.base_url, &self.portal.documents_path)
    }

    pub fn login_url(&self) -> String {
        join_url(&self.portal.base_url, &self.portal.login_path)
    }

    /// Portal page of a single document, e.g. `https://portal/documents/7/`.
    pub fn document_url(&self, id: DocumentId) -> String {
        format!("{}{}/", ensure_trailing_slash(&self.portal_url()), id)
    }

    pub fn subject(&self, document: &ClientDocument) -> String {
        format!("{} - {}", SUBJECT_PREFIX, document.kind.label())
    }

    pub fn build(&self, document: &ClientDocument, recipient: &Client) -> NotificationRequest {
        let mut context = Map::new();
        context.insert("client_name".into(), json!(recipient.display_name()));
        context.insert("document_kind_label".into(), json!(document.kind.label()));
        context.insert("document_title".into(), json!(document.title));
        context.insert(
            "send_date_formatted".into(),
            json!(document.created_at.format(SEND_DATE_FORMAT).to_string()),
        );
        context.insert(
            "description".into(),
            json!(document.description.as_deref().unwrap_or("")),
        );
        context.insert("portal_url".into(), json!(self.portal_url()));
        context.insert("login_url".into(), json!(self.login_url()));
        context.insert("document_url".into(), json!(self.document_url(document.id)));
        context.insert("support_email".into(), json!(self.portal.support_email));
        context.insert("company_name".into(), json!(self.portal.company_name));
        context.insert("current_year".into(), Value::from(Utc::now().year()));

        NotificationRequest {
            recipient_email: recipient.email.trim().to_string(),
            recipient_name: recipient.display_name().to_string(),
            subject: self.subject(document),
            template: DOCUMENT_NOTIFICATION.to_string(),
            context,
        }
    }
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    )
}
