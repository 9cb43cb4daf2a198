//! Best-effort HTML-to-text reduction.
//!
//! Tag and entity stripping only; this is a fallback for messages with no
//! plain-text part, not a renderer. Block-level tags become newlines so the
//! quote stripper still sees a line structure.

use regex::Regex;

/// Reduces an HTML body to approximate plain text.
pub struct HtmlReducer {
    script_style: Regex,
    line_breaks: Regex,
    tags: Regex,
}

impl HtmlReducer {
    pub fn new() -> Self {
        Self {
            script_style: Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>")
                .expect("valid pattern"),
            line_breaks: Regex::new(r"(?i)<(?:br\s*/?|/?(?:p|div|tr|li|h[1-6])\b[^>]*)>")
                .expect("valid pattern"),
            tags: Regex::new(r"(?s)<[^>]*>").expect("valid pattern"),
        }
    }

    /// Strip tags and entities, collapsing runs of blank lines.
    pub fn reduce(&self, html: &str) -> String {
        let text = self.script_style.replace_all(html, "");
        let text = self.line_breaks.replace_all(&text, "\n");
        let text = self.tags.replace_all(&text, "");

        let text = decode_entities(&text);

        // Collapse multiple blank lines into at most one.
        let mut cleaned = String::with_capacity(text.len());
        let mut prev_was_blank = false;
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if !prev_was_blank {
                    cleaned.push('\n');
                    prev_was_blank = true;
                }
            } else {
                cleaned.push_str(trimmed);
                cleaned.push('\n');
                prev_was_blank = false;
            }
        }
        cleaned.trim().to_string()
    }
}

impl Default for HtmlReducer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode the handful of entities that actually show up in mail bodies.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
