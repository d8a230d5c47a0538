//! Doxygen comment → HTML documentation lines.

use tracing::warn;

/// Comment delimiters removed from the front of each line, in order.
const COMMENT_PREFIXES: &[&str] = &["/*!", "/**", "*/", "//!", "///", "//", "*"];

/// Structural tags whose content is kept as plain text.
const TAG_PREFIXES: &[&str] = &["\\brief", "\\details", "\\ingroup"];

fn escape_html(line: &str) -> String {
    line.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn front_strip<'a>(line: &'a str, key: &str) -> &'a str {
    match line.strip_prefix(key) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line,
    }
}

/// Wrap a line that starts with `tag`: the tag becomes `open`, `close` is appended.
fn wrap_tag(line: &str, tag: &str, open: &str, close: &str) -> Option<String> {
    line.starts_with(tag).then(|| format!("{}{}", line.replace(tag, open), close))
}

/// Remove `\p` markers that stand alone as a word.
fn strip_p_markers(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(idx) = rest.find("\\p") {
        let after = &rest[idx + 2..];
        let whole = !after.starts_with(|c: char| c.is_alphanumeric() || c == '_');
        out.push_str(&rest[..idx]);
        if !whole {
            out.push_str("\\p");
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Convert a raw doxygen block into documentation lines with a small subset
/// of inline markup turned into HTML. Unknown backslash tags are passed
/// through with a warning.
pub fn doc_lines(doxygen: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut in_list = false;

    for raw in doxygen.lines() {
        let escaped = escape_html(raw.trim());
        let mut line: &str = &escaped;
        for prefix in COMMENT_PREFIXES {
            line = front_strip(line, prefix);
        }
        for prefix in TAG_PREFIXES {
            line = front_strip(line, prefix);
        }
        let mut line = line.to_string();

        let list_item = line.starts_with("\\li");
        if list_item {
            line = format!("{}</li>", line.replace("\\li", "<li>"));
        }
        if list_item && !in_list {
            in_list = true;
            line = format!("<ul>{line}");
        } else if in_list && !list_item {
            in_list = false;
            line.push_str("</ul>");
        }

        if let Some(l) = wrap_tag(&line, "\\b", "<b>", "</b>") {
            line = l;
        }
        if line.starts_with("\\code") {
            line = line.replace("\\code", "<code>");
        }
        if line.starts_with("\\endcode") {
            line = line.replace("\\endcode", "</code>");
        }

        // formulas become preformatted text
        if line.starts_with("\\f[") {
            line = line.replace("\\f[", "<pre>");
        }
        if line.starts_with("\\f]") {
            line = line.replace("\\f]", "</pre>");
        }
        if line.contains("\\f$") {
            line = line.replacen("\\f$", "<pre>", 1).replacen("\\f$", "</pre>", 1);
        }

        if let Some(l) = wrap_tag(&line, "\\sa", "<i>", "</i>") {
            line = l;
        }
        if let Some(l) = wrap_tag(&line, "\\section", "<h2>", "</h2>") {
            line = l;
        } else if let Some(l) = wrap_tag(&line, "\\subsection", "<h3>", "</h3>") {
            line = l;
        }

        line = strip_p_markers(&line);

        if line.starts_with('\\') {
            warn!(line = %line, "Unknown doxygen field");
        }
        lines.push(line);
    }

    lines
}
