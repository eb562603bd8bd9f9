//! Template storage and rendering

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::builtin::builtin_templates;
use super::html::strip_tags;
use super::substitution::{substitute, Escape};
use super::types::{EmailTemplate, RenderedTemplate, TemplateError, TemplateResult};

/// In-memory template storage
pub struct TemplateStore {
    templates: DashMap<String, EmailTemplate>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create an empty template store
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Create a store preloaded with the built-in templates
    pub fn with_builtin() -> Self {
        let store = Self::new();
        for template in builtin_templates() {
            store.templates.insert(template.name.clone(), template);
        }
        store
    }

    /// Insert or replace a template after validating it
    pub fn register(&self, mut template: EmailTemplate) -> TemplateResult<()> {
        template.validate()?;
        template.updated_at = Utc::now();

        tracing::debug!(template = %template.name, "Template registered");
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Get a template by name
    pub fn get(&self, name: &str) -> TemplateResult<EmailTemplate> {
        self.templates
            .get(name)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }

    /// Template names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// Renders named templates into HTML plus a plain-text alternative.
#[derive(Clone)]
pub struct TemplateRenderer {
    store: Arc<TemplateStore>,
}

impl TemplateRenderer {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    /// Render `name` with `context`.
    ///
    /// The text part comes from the template's own text body when present,
    /// otherwise it is derived from the rendered HTML.
    pub fn render(
        &self,
        name: &str,
        context: &Map<String, Value>,
    ) -> TemplateResult<RenderedTemplate> {
        let template = self.store.get(name)?;

        let html = substitute(&template.html, context, Escape::Html)?;
        let text = match &template.text {
            Some(text) => substitute(text, context, Escape::None)?,
            None => strip_tags(&html),
        };

        Ok(RenderedTemplate { html, text })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(Arc::new(TemplateStore::with_builtin()))
    }
}
