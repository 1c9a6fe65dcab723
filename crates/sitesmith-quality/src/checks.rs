//! Signals extracted from a document in a single pass
//!
//! The gate and the metrics snapshot both read from a `MarkupScan`, so a
//! document is lowercased and tag-matched once per validation.

use once_cell::sync::Lazy;
use regex::Regex;

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("img pattern"));

static ALT_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\balt\s*=").expect("alt pattern"));

static SECTION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<section[\s>]").expect("section pattern"));

/// A flat CSS rule: selector text and declaration body.
static CSS_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^{}]*)\{([^{}]*)\}").expect("rule pattern"));

static OPACITY_ZERO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"opacity\s*:\s*0\s*(?:;|$)").expect("opacity pattern"));

static ICON_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<script[^>]*src\s*=\s*["'][^"']*lucide"#).expect("script pattern"));

pub struct MarkupScan<'a> {
    html: &'a str,
    lower: String,
}

impl<'a> MarkupScan<'a> {
    pub fn new(html: &'a str) -> Self {
        Self {
            html,
            lower: html.to_ascii_lowercase(),
        }
    }

    pub fn html(&self) -> &str {
        self.html
    }

    /// Case-sensitive substring test against the raw document.
    pub fn contains(&self, needle: &str) -> bool {
        self.html.contains(needle)
    }

    fn has(&self, lowercase_needle: &str) -> bool {
        self.lower.contains(lowercase_needle)
    }

    // === Structure ===

    pub fn has_doctype(&self) -> bool {
        has_doctype(self.html)
    }

    pub fn has_viewport(&self) -> bool {
        self.has("<meta") && self.has("viewport")
    }

    pub fn mentions_viewport(&self) -> bool {
        self.has("viewport")
    }

    pub fn has_charset(&self) -> bool {
        self.has("<meta") && self.has("charset")
    }

    pub fn has_title(&self) -> bool {
        self.has("<title>") || self.has("<title ")
    }

    pub fn has_navigation(&self) -> bool {
        self.has("<nav") || self.has("<header")
    }

    pub fn has_footer(&self) -> bool {
        self.has("<footer")
    }

    pub fn section_count(&self) -> usize {
        SECTION_TAG.find_iter(self.html).count()
    }

    // === Responsive ===

    pub fn has_media_queries(&self) -> bool {
        self.has("@media")
    }

    pub fn has_fluid_sizing(&self) -> bool {
        self.has("clamp(")
    }

    pub fn has_utility_framework(&self) -> bool {
        self.has("tailwindcss")
    }

    // === Typography ===

    pub fn has_web_fonts(&self) -> bool {
        self.has("fonts.googleapis.com") || self.has("fonts.gstatic.com")
    }

    /// Stylesheet links, not individual families.
    pub fn font_count(&self) -> usize {
        usize::from(self.has("fonts.googleapis.com"))
    }

    // === Media ===

    pub fn image_tags(&self) -> Vec<&'a str> {
        IMG_TAG.find_iter(self.html).map(|m| m.as_str()).collect()
    }

    pub fn images_missing_alt(&self) -> usize {
        self.image_tags()
            .iter()
            .filter(|tag| !ALT_ATTR.is_match(tag))
            .count()
    }

    // === Motion & interaction ===

    pub fn has_animations(&self) -> bool {
        self.has("@keyframes") || self.contains("IntersectionObserver") || self.has("transition")
    }

    /// Rules that default to `opacity: 0` outside an `.active` selector.
    pub fn hidden_by_default_rules(&self) -> usize {
        CSS_RULE
            .captures_iter(self.html)
            .filter(|caps| {
                let selector = caps.get(1).map_or("", |m| m.as_str());
                let body = caps.get(2).map_or("", |m| m.as_str()).trim();
                !selector.contains(".active") && OPACITY_ZERO.is_match(body)
            })
            .count()
    }

    pub fn has_hover_states(&self) -> bool {
        self.has(":hover") || self.has("hover:")
    }

    pub fn has_smooth_scroll(&self) -> bool {
        self.has("scroll-behavior") && self.has("smooth")
    }

    // === Dependencies ===

    /// Icon placeholders present but no icon script loaded.
    pub fn icons_without_library(&self) -> bool {
        self.has("data-lucide") && !ICON_SCRIPT.is_match(self.html)
    }
}

/// Doctype check shared with the auto-fixer.
pub(crate) fn has_doctype(html: &str) -> bool {
    html.to_ascii_lowercase().contains("<!doctype html")
}
