//! Message body to bounded plain text for classification

use crate::logger::SharedLogger;
use mailsort_graph::{GraphBody, GraphMessage};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

/// Longest text handed to the classifier, in characters
pub const MAX_BODY_CHARS: usize = 2000;

/// HTML inputs longer than this (in characters) are not converted
pub const MAX_HTML_INPUT_CHARS: usize = 16 * 1024;

/// Elements dropped together with everything inside them. Void elements such
/// as `img` carry no content and are stripped by the empty whitelist; ammonia
/// rejects a tag listed here that also has whitelisted attributes.
const DROPPED_ELEMENTS: &[&str] = &["head", "title", "meta", "style", "script"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("HTML input too large: {0} characters")]
    InputTooLarge(usize),
}

fn block_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)<(?:br|hr|/?(?:p|div|li|tr|td|th|h[1-6]|table|ul|ol|blockquote|section|article|header|footer))\b",
        )
        .expect("block tag pattern")
    })
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n\s*\n").expect("blank lines pattern"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strip markup and squeeze whitespace.
///
/// Link text survives, link targets and image/style/script/head content do
/// not. Block-level elements become line breaks before the whitespace
/// collapse so adjacent paragraphs don't run together.
pub fn html_to_text(html: &str) -> Result<String, BodyError> {
    let len = html.chars().count();
    if len > MAX_HTML_INPUT_CHARS {
        return Err(BodyError::InputTooLarge(len));
    }

    let separated = block_tag_re().replace_all(html, "\n${0}");

    let sanitized = ammonia::Builder::empty()
        .clean_content_tags(DROPPED_ELEMENTS.iter().copied().collect::<HashSet<_>>())
        .clean(&separated)
        .to_string();

    // The sanitizer re-escapes text; undo the escapes it emits, except for
    // angle brackets so escaped markup in the text never reads as markup
    let text = sanitized
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    let text = blank_lines_re().replace_all(&text, "\n\n");
    let text = whitespace_re().replace_all(&text, " ");
    Ok(truncate_chars(text.trim(), MAX_BODY_CHARS).to_string())
}

/// Converts message bodies for the classifier
pub struct BodyNormalizer {
    logger: SharedLogger,
}

impl BodyNormalizer {
    pub fn new(logger: SharedLogger) -> Self {
        Self { logger }
    }

    /// Plain text for `body`, or `preview` when there is nothing to convert
    /// or conversion fails.
    pub fn normalize(&self, body: Option<&GraphBody>, preview: &str) -> String {
        let body = match body {
            Some(body) if !body.content.is_empty() => body,
            _ => return preview.to_string(),
        };

        if body.is_html() {
            match html_to_text(&body.content) {
                Ok(text) => text,
                Err(e) => {
                    self.logger
                        .warn(&format!("HTML->text conversion failed ({}), using preview", e));
                    preview.to_string()
                }
            }
        } else {
            truncate_chars(&body.content, MAX_BODY_CHARS).to_string()
        }
    }

    pub fn normalize_message(&self, message: &GraphMessage) -> String {
        self.normalize(
            message.body.as_ref(),
            message.body_preview.as_deref().unwrap_or(""),
        )
    }
}
