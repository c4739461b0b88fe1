//! Allowlist sanitizer for rich text fields.

use once_cell::sync::Lazy;
use regex::Regex;

const ALLOWED_TAGS: &[&str] = &["b", "strong", "i", "em", "u", "ul", "ol", "li", "p", "br"];

static DROPPED_BLOCKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());

static COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").unwrap());

/// Keep only basic formatting tags, with every attribute stripped.
///
/// `script` and `style` elements are removed with their content; any other
/// tag is removed but its text is kept. Angle brackets left in the text are
/// escaped, so a tag that never closes cannot survive as markup.
pub fn sanitize_html(input: &str) -> String {
    let without_blocks = DROPPED_BLOCKS.replace_all(input, "");
    let without_comments = COMMENTS.replace_all(&without_blocks, "");

    let mut out = String::with_capacity(without_comments.len());
    let mut last = 0;
    for caps in TAG.captures_iter(&without_comments) {
        let Some(whole) = caps.get(0) else { continue };
        escape_text(&without_comments[last..whole.start()], &mut out);
        last = whole.end();

        let name = caps[2].to_ascii_lowercase();
        if !ALLOWED_TAGS.contains(&name.as_str()) {
            continue;
        }
        match (&caps[1], name.as_str()) {
            (_, "br") => out.push_str("<br>"),
            ("/", _) => {
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
            _ => {
                out.push('<');
                out.push_str(&name);
                out.push('>');
            }
        }
    }
    escape_text(&without_comments[last..], &mut out);
    out
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
