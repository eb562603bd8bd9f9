//! Template types and error definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::substitution::check_syntax;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid template name: {0}")]
    InvalidName(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// An e-mail template: an HTML body with an optional plain-text twin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    /// Path-like name, e.g. `emails/document_notification`
    pub name: String,

    /// HTML body with `{{variable}}` placeholders
    pub html: String,

    /// Plain-text body. Derived from the HTML when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl EmailTemplate {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
            text: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Validate the name and the placeholder syntax of both bodies.
    pub fn validate(&self) -> TemplateResult<()> {
        if self.name.is_empty() || self.name.len() > 128 {
            return Err(TemplateError::InvalidName(
                "Name must be 1-128 characters".to_string(),
            ));
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'))
        {
            return Err(TemplateError::InvalidName(
                "Name must contain only alphanumeric, dash, underscore, dot or slash".to_string(),
            ));
        }

        if self.html.trim().is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "HTML body must not be empty".to_string(),
            ));
        }

        check_syntax(&self.html)?;
        if let Some(text) = &self.text {
            check_syntax(text)?;
        }

        Ok(())
    }
}

/// Output of rendering a template: both parts of a multipart/alternative body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub html: String,
    pub text: String,
}
