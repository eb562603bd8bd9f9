//! Variable substitution engine for templates
//!
//! Supported tags:
//! - `{{name}}` value of `name`, HTML-escaped in HTML mode
//! - `{{&name}}` value of `name`, never escaped
//! - `{{#name}}...{{/name}}` body rendered when `name` is truthy
//! - `{{^name}}...{{/name}}` body rendered when `name` is falsy
//!
//! Unknown variables render as empty strings. Sections are conditionals
//! only; they do not iterate arrays.

use serde_json::{Map, Value};

use super::html::escape_html;
use super::types::{TemplateError, TemplateResult};

/// How substituted values are written into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Html,
    None,
}

/// Render `template` against `variables`.
pub fn substitute(
    template: &str,
    variables: &Map<String, Value>,
    escape: Escape,
) -> TemplateResult<String> {
    let mut out = String::with_capacity(template.len());
    render_into(template, variables, escape, &mut out)?;
    Ok(out)
}

/// Parse without rendering; reports the same syntax errors as `substitute`.
pub fn check_syntax(template: &str) -> TemplateResult<()> {
    substitute(template, &Map::new(), Escape::None).map(|_| ())
}

fn render_into(
    template: &str,
    variables: &Map<String, Value>,
    escape: Escape,
    out: &mut String,
) -> TemplateResult<()> {
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open.find("}}").ok_or_else(|| {
            TemplateError::InvalidTemplate(format!(
                "Unclosed tag near '{}'",
                snippet(&rest[open..])
            ))
        })?;

        let tag = after_open[..close].trim();
        rest = &after_open[close + 2..];

        if let Some(name) = tag.strip_prefix('#') {
            let name = name.trim();
            let (body, remaining) = split_section(rest, name)?;
            if is_truthy(variables.get(name)) {
                render_into(body, variables, escape, out)?;
            }
            rest = remaining;
        } else if let Some(name) = tag.strip_prefix('^') {
            let name = name.trim();
            let (body, remaining) = split_section(rest, name)?;
            if !is_truthy(variables.get(name)) {
                render_into(body, variables, escape, out)?;
            }
            rest = remaining;
        } else if let Some(name) = tag.strip_prefix('/') {
            return Err(TemplateError::InvalidTemplate(format!(
                "Unexpected closing tag '{}'",
                name.trim()
            )));
        } else if let Some(name) = tag.strip_prefix('&') {
            out.push_str(&value_to_string(variables.get(name.trim())));
        } else {
            let value = value_to_string(variables.get(tag));
            match escape {
                Escape::Html => out.push_str(&escape_html(&value)),
                Escape::None => out.push_str(&value),
            }
        }
    }

    out.push_str(rest);
    Ok(())
}

/// Split `source` at the `{{/name}}` that closes a section opened just before it.
fn split_section<'a>(source: &'a str, name: &str) -> TemplateResult<(&'a str, &'a str)> {
    let mut depth = 0usize;
    let mut offset = 0usize;

    while let Some(open) = source[offset..].find("{{") {
        let tag_start = offset + open;
        let Some(close) = source[tag_start + 2..].find("}}") else {
            break;
        };
        let tag_end = tag_start + 2 + close + 2;
        let tag = source[tag_start + 2..tag_end - 2].trim();

        if let Some(inner) = tag.strip_prefix('#').or_else(|| tag.strip_prefix('^')) {
            if inner.trim() == name {
                depth += 1;
            }
        } else if let Some(inner) = tag.strip_prefix('/') {
            if inner.trim() == name {
                if depth == 0 {
                    return Ok((&source[..tag_start], &source[tag_end..]));
                }
                depth -= 1;
            }
        }

        offset = tag_end;
    }

    Err(TemplateError::InvalidTemplate(format!(
        "Section '{}' is never closed",
        name
    )))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Number(_)) => true,
    }
}

fn value_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        // For arrays and objects, use JSON representation
        Some(other) => other.to_string(),
    }
}

fn snippet(source: &str) -> String {
    source.chars().take(24).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("variables must be an object"),
        }
    }

    #[test]
    fn test_substitute_simple() {
        let result = substitute(
            "Olá, {{ client_name }}!",
            &vars(json!({"client_name": "Ana Costa"})),
            Escape::Html,
        )
        .unwrap();
        assert_eq!(result, "Olá, Ana Costa!");
    }

    #[test]
    fn test_html_escaping() {
        let v = vars(json!({"title": "<b>Lucro & Perdas</b>"}));

        let html = substitute("<p>{{title}}</p>", &v, Escape::Html).unwrap();
        assert_eq!(html, "<p>&lt;b&gt;Lucro &amp; Perdas&lt;/b&gt;</p>");

        let raw = substitute("<p>{{&title}}</p>", &v, Escape::Html).unwrap();
        assert_eq!(raw, "<p><b>Lucro & Perdas</b></p>");

        let text = substitute("{{title}}", &v, Escape::None).unwrap();
        assert_eq!(text, "<b>Lucro & Perdas</b>");
    }

    #[test]
    fn test_unknown_variable_renders_empty() {
        let result = substitute("[{{missing}}]", &Map::new(), Escape::Html).unwrap();
        assert_eq!(result, "[]");
    }

    #[test]
    fn test_number_variable() {
        let result = substitute("© {{year}}", &vars(json!({"year": 2025})), Escape::Html).unwrap();
        assert_eq!(result, "© 2025");
    }

    #[test]
    fn test_sections() {
        let template = "{{#description}}Descrição: {{description}}{{/description}}\
                        {{^description}}Sem descrição{{/description}}";

        let with = substitute(template, &vars(json!({"description": "Anual"})), Escape::Html);
        assert_eq!(with.unwrap(), "Descrição: Anual");

        let empty = substitute(template, &vars(json!({"description": ""})), Escape::Html);
        assert_eq!(empty.unwrap(), "Sem descrição");

        let missing = substitute(template, &Map::new(), Escape::Html);
        assert_eq!(missing.unwrap(), "Sem descrição");
    }

    #[test]
    fn test_nested_sections_same_name() {
        let template = "{{#a}}1{{#a}}2{{/a}}3{{/a}}4";
        let result = substitute(template, &vars(json!({"a": true})), Escape::None).unwrap();
        assert_eq!(result, "1234");

        let result = substitute(template, &vars(json!({"a": false})), Escape::None).unwrap();
        assert_eq!(result, "4");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            check_syntax("Hello {{name"),
            Err(TemplateError::InvalidTemplate(_))
        ));
        assert!(matches!(
            check_syntax("{{#open}} never closed"),
            Err(TemplateError::InvalidTemplate(_))
        ));
        assert!(matches!(
            check_syntax("stray {{/close}}"),
            Err(TemplateError::InvalidTemplate(_))
        ));
        assert!(check_syntax("plain text, no tags").is_ok());
    }
}
