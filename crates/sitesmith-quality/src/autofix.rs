//! Deterministic, idempotent repairs for structurally required markup

use once_cell::sync::Lazy;
use regex::Regex;

use crate::checks::has_doctype;

static HEAD_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("head pattern"));
static STYLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<style(?:\s[^>]*)?>").expect("style pattern"));
static HEAD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head>").expect("head pattern"));

const VIEWPORT_META: &str = "\n  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">";
const CHARSET_META: &str = "\n  <meta charset=\"UTF-8\">";
const SMOOTH_SCROLL_RULE: &str = "\n  html { scroll-behavior: smooth; }";
const SMOOTH_SCROLL_BLOCK: &str = "  <style>html { scroll-behavior: smooth; }</style>\n";

/// Inserts `text` right after the first match of `anchor`.
fn insert_after(html: &str, anchor: &Regex, text: &str) -> Option<String> {
    let m = anchor.find(html)?;
    let mut out = String::with_capacity(html.len() + text.len());
    out.push_str(&html[..m.end()]);
    out.push_str(text);
    out.push_str(&html[m.end()..]);
    Some(out)
}

/// Inserts `text` right before the first match of `anchor`.
fn insert_before(html: &str, anchor: &Regex, text: &str) -> Option<String> {
    let m = anchor.find(html)?;
    let mut out = String::with_capacity(html.len() + text.len());
    out.push_str(&html[..m.start()]);
    out.push_str(text);
    out.push_str(&html[m.start()..]);
    Some(out)
}

/// Adds the doctype, viewport and charset declarations and a smooth-scroll
/// rule when they are absent. Applying it twice changes nothing.
pub fn auto_fix(html: &str) -> String {
    let mut fixed = html.to_string();

    if !has_doctype(&fixed) {
        fixed = format!("<!DOCTYPE html>\n{fixed}");
    }

    let lower = fixed.to_ascii_lowercase();
    if !lower.contains("viewport") {
        if let Some(next) = insert_after(&fixed, &HEAD_OPEN, VIEWPORT_META) {
            fixed = next;
        }
    }

    if !fixed.to_ascii_lowercase().contains("charset") {
        if let Some(next) = insert_after(&fixed, &HEAD_OPEN, CHARSET_META) {
            fixed = next;
        }
    }

    if !fixed.to_ascii_lowercase().contains("scroll-behavior") {
        let next = insert_after(&fixed, &STYLE_OPEN, SMOOTH_SCROLL_RULE)
            .or_else(|| insert_before(&fixed, &HEAD_CLOSE, SMOOTH_SCROLL_BLOCK));
        if let Some(next) = next {
            fixed = next;
        }
    }

    fixed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_doctype() {
        let fixed = auto_fix("<html><head></head><body>hi</body></html>");
        assert!(fixed.starts_with("<!DOCTYPE html>\n"));
    }

    #[test]
    fn test_adds_viewport_and_charset_after_head() {
        let fixed = auto_fix("<!DOCTYPE html><html><head lang=\"en\"></head><body>hi</body></html>");
        assert!(fixed.contains("name=\"viewport\""));
        assert!(fixed.contains("<meta charset=\"UTF-8\">"));
        assert!(fixed.find("<head lang=\"en\">").unwrap() < fixed.find("viewport").unwrap());
    }

    #[test]
    fn test_smooth_scroll_into_existing_style() {
        let fixed = auto_fix("<!DOCTYPE html><html><head><style></style></head><body></body></html>");
        assert!(fixed.contains("<style>\n  html { scroll-behavior: smooth; }"));
        assert_eq!(fixed.matches("<style").count(), 1);
    }

    #[test]
    fn test_smooth_scroll_block_without_style() {
        let fixed = auto_fix("<!DOCTYPE html><html><head></head><body></body></html>");
        assert!(fixed.contains("<style>html { scroll-behavior: smooth; }</style>\n</head>"));
    }

    #[test]
    fn test_fragment_without_head_only_gains_doctype() {
        let fixed = auto_fix("<div>x</div>");
        assert_eq!(fixed, "<!DOCTYPE html>\n<div>x</div>");
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "<div>x</div>",
            "<html><head></head><body></body></html>",
            "<!doctype html><html><HEAD><STYLE>body{}</STYLE></HEAD></html>",
            "",
        ] {
            let once = auto_fix(input);
            assert_eq!(auto_fix(&once), once, "input: {input}");
        }
    }
}
