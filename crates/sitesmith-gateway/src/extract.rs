//! Tolerant extractors for structured data and markup in model output
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use sitesmith_core::{Result, SmithError};

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)```").expect("fence pattern"));

static FENCED_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:html)?\n?([\s\S]*?)```").expect("fence pattern"));

const DOC_START: [&str; 2] = ["<!doctype", "<html"];
const DOC_END: &str = "</html>";

// ============================================================================
// STRUCTURED DATA
// ============================================================================

/// End of the balanced value opening at `start`, honouring strings and
/// escapes. `None` when the text ends first or a closer does not match.
fn balanced_end(body: &str, start: usize) -> Option<usize> {
    let mut expected = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in body[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => expected.push('}'),
            '[' => expected.push(']'),
            '}' | ']' => {
                if expected.pop() != Some(ch) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(start + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Candidate JSON slices in text order: every `{` or `[` paired with its
/// balanced closer.
fn json_candidates(text: &str) -> Vec<&str> {
    let mut body = text.trim();
    if let Some(inner) = FENCED_JSON.captures(body).and_then(|c| c.get(1)) {
        body = inner.as_str().trim();
    }

    body.char_indices()
        .filter(|(_, ch)| matches!(ch, '{' | '['))
        .filter_map(|(start, _)| balanced_end(body, start).map(|end| &body[start..=end]))
        .collect()
}

/// The first well-formed JSON payload embedded in `text`, if any.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    json_candidates(text)
        .into_iter()
        .find(|candidate| serde_json::from_str::<serde_json::Value>(candidate).is_ok())
}

/// Parses model output into `T`, tolerating fences and surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    let mut last_error = String::from("no JSON object or array found");
    for candidate in json_candidates(text) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = err.to_string(),
        }
    }
    Err(SmithError::parse(
        format!("Failed to parse JSON from LLM response ({last_error})"),
        text,
    ))
}

// ============================================================================
// MARKUP
// ============================================================================

fn has_doc_start(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    DOC_START.iter().any(|marker| lower.contains(marker))
}

/// Pulls the document out of model output.
///
/// Strips a fence around the document, drops prose before the first
/// document-start marker and after the last `</html>`. Text without any
/// document marker is returned unchanged.
pub fn extract_markup(text: &str) -> String {
    if !has_doc_start(text) && !text.to_ascii_lowercase().contains(DOC_END) {
        return text.to_string();
    }

    let mut html = text.trim();
    if let Some(inner) = FENCED_MARKUP.captures(html).and_then(|c| c.get(1)) {
        if has_doc_start(inner.as_str()) {
            html = inner.as_str().trim();
        }
    }

    // Lowercasing ASCII keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    if !DOC_START.iter().any(|marker| lower.starts_with(marker)) {
        if let Some(start) = DOC_START.iter().filter_map(|m| lower.find(m)).min() {
            html = &html[start..];
        }
    }

    let lower = html.to_ascii_lowercase();
    match lower.rfind(DOC_END) {
        Some(end) if end > 0 => html[..end + DOC_END.len()].to_string(),
        _ => html.to_string(),
    }
}

/// True when the text contains a document-start marker.
pub fn has_document_marker(text: &str) -> bool {
    has_doc_start(text)
}
