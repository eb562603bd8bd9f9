//! E-mail template system.
//!
//! This module provides:
//! - Template definitions with `{{variable}}` placeholders and conditional sections
//! - In-memory template storage preloaded with the built-in templates
//! - Rendering into an HTML body plus a plain-text alternative
//!
//! # Example
//!
//! ```ignore
//! let renderer = TemplateRenderer::default();
//! let rendered = renderer.render(DOCUMENT_NOTIFICATION, &context)?;
//! send(rendered.html, rendered.text);
//! ```

mod builtin;
mod html;
mod store;
mod substitution;
mod types;

pub use builtin::{builtin_templates, DOCUMENT_NOTIFICATION};
pub use html::{escape_html, strip_tags};
pub use store::{TemplateRenderer, TemplateStore};
pub use substitution::{check_syntax, substitute, Escape};
pub use types::{EmailTemplate, RenderedTemplate, TemplateError, TemplateResult};
