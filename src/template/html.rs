//! HTML helpers: escaping and the plain-text fallback.

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Derive a readable plain-text body from an HTML body.
///
/// Drops `<style>`, `<script>` and `<title>` blocks and every tag. Block ends
/// and `<br>` become line breaks, link targets are kept as `text (url)`, and
/// common entities are decoded before whitespace is collapsed.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut pending_href: Option<String> = None;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('>') else {
            out.push_str(after);
            rest = "";
            break;
        };

        let tag = &after[1..end];
        rest = &after[end + 1..];

        match tag_name(tag).as_str() {
            name @ ("style" | "script" | "title") => {
                let closing = format!("</{}", name);
                rest = match rest.to_ascii_lowercase().find(&closing) {
                    Some(pos) => &rest[pos..],
                    None => "",
                };
            }
            "br" | "/p" | "/div" | "/tr" | "/li" | "/table" | "/h1" | "/h2" | "/h3" | "/h4"
            | "/h5" | "/h6" => out.push('\n'),
            "a" => pending_href = attribute(tag, "href"),
            "/a" => {
                if let Some(href) = pending_href.take() {
                    if !href.is_empty() && !href.starts_with("mailto:") {
                        out.push_str(" (");
                        out.push_str(&href);
                        out.push(')');
                    }
                }
            }
            "td" | "th" => out.push(' '),
            _ => {}
        }
    }
    out.push_str(rest);

    normalize_whitespace(&decode_entities(&out))
}

fn tag_name(tag: &str) -> String {
    tag.split(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_end_matches('/')
        .to_ascii_lowercase()
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let needle = format!("{}=\"", name);
    let start = lower.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(tag[start..start + len].to_string())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&copy;", "©")
        .replace("&amp;", "&")
}

fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            // keep at most one blank line between paragraphs
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
        } else {
            lines.push(collapsed);
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("Balanço 2025"), "Balanço 2025");
    }

    #[test]
    fn test_strip_tags_basic() {
        let text = strip_tags("<p>Olá, <strong>Ana</strong>!</p><p>Segunda linha</p>");
        assert_eq!(text, "Olá, Ana!\nSegunda linha");
    }

    #[test]
    fn test_strip_tags_drops_style_and_script() {
        let html = "<html><head><STYLE>p { color: red; }</STYLE></head>\
                    <body><script>alert(1)</script><p>Conteúdo</p></body></html>";
        assert_eq!(strip_tags(html), "Conteúdo");
    }

    #[test]
    fn test_strip_tags_keeps_link_targets() {
        let html = r#"<p><a href="https://portal.example/documents/">Acessar</a></p>
                      <p><a href="mailto:suporte@example.com">suporte@example.com</a></p>"#;
        let text = strip_tags(html);
        assert!(text.contains("Acessar (https://portal.example/documents/)"));
        assert!(text.contains("suporte@example.com"));
        assert!(!text.contains("mailto:"));
    }

    #[test]
    fn test_strip_tags_decodes_entities_and_collapses_blank_lines() {
        let html = "<p>A &amp; B</p>\n\n\n\n<p>&copy; 2025&nbsp;Vetorial</p>";
        assert_eq!(strip_tags(html), "A & B\n\n© 2025 Vetorial");
    }

    #[test]
    fn test_strip_tags_line_breaks() {
        assert_eq!(strip_tags("um<br>dois<br/>três"), "um\ndois\ntrês");
    }
}
