//! Quality Gate evaluation for generated documents
//!
//! Runs every check against a document and scores the resulting issue
//! list. Checks are independent; their order only affects report order.

use super::checks::MarkupScan;
use super::metrics::collect_metrics;
use super::profile::QualityProfile;
use sitesmith_core::{Issue, QualityReport, Severity, StyleSystem};

/// Quality gate that validates documents against a profile
pub struct QualityGate {
    profile: QualityProfile,
}

impl QualityGate {
    pub fn new(profile: QualityProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    /// Pure, network-free analysis of `html`.
    pub fn validate(&self, html: &str, style: Option<&StyleSystem>) -> QualityReport {
        let scan = MarkupScan::new(html);
        let mut issues = Vec::new();

        // === Structure Checks ===
        if !scan.has_doctype() {
            issues.push(
                Issue::new(Severity::Critical, "structure", "Missing <!DOCTYPE html> declaration")
                    .fixable(),
            );
        }
        if !scan.has_viewport() {
            issues.push(
                Issue::new(Severity::Critical, "responsive", "Missing <meta name=\"viewport\"> tag")
                    .fixable(),
            );
        }
        if !scan.has_charset() {
            issues.push(Issue::new(Severity::Warning, "structure", "Missing charset meta tag").fixable());
        }
        if !scan.has_title() {
            issues.push(Issue::new(Severity::Warning, "seo", "Missing <title> tag"));
        }

        // === Responsive Checks ===
        if !scan.has_media_queries() && !scan.has_utility_framework() {
            issues.push(Issue::new(
                Severity::Warning,
                "responsive",
                "No media queries or utility framework detected, layout may not be responsive",
            ));
        }

        // === Typography Checks ===
        if !scan.has_web_fonts() {
            issues.push(Issue::new(
                Severity::Info,
                "typography",
                "No web fonts imported, using system fonts only",
            ));
        }
        if let Some(style) = style {
            let display = style.fonts.display.trim();
            if !display.is_empty() && !scan.contains(display) {
                issues.push(Issue::new(
                    Severity::Warning,
                    "typography",
                    format!("Design system display font \"{display}\" not found in HTML"),
                ));
            }
        }

        // === Palette Checks ===
        if let Some(style) = style {
            let primary = style.colors.primary.trim().to_ascii_lowercase();
            let html_lower = html.to_ascii_lowercase();
            if !primary.is_empty() && !html_lower.contains(&primary) && !scan.contains("var(--primary)") {
                issues.push(Issue::new(
                    Severity::Warning,
                    "design_system",
                    format!("Primary color {primary} not found in HTML"),
                ));
            }

            let uses_defaults = self
                .profile
                .framework_default_classes
                .iter()
                .any(|class| scan.contains(class));
            if uses_defaults {
                issues.push(Issue::new(
                    Severity::Warning,
                    "design_system",
                    "Using Tailwind default color classes instead of design system custom properties",
                ));
            }
        }

        // === Media Checks ===
        let missing_alt = scan.images_missing_alt();
        if missing_alt > 0 {
            issues.push(Issue::new(
                Severity::Warning,
                "accessibility",
                format!("{missing_alt} image(s) missing alt text"),
            ));
        }
        if self.profile.placeholder_hosts.iter().any(|host| scan.contains(host)) {
            issues.push(Issue::new(
                Severity::Info,
                "content",
                "Placeholder image service detected, replace with real images",
            ));
        }

        // === Motion Checks ===
        if !scan.has_animations() {
            issues.push(Issue::new(Severity::Info, "polish", "No animations or transitions detected"));
        }
        if scan.hidden_by_default_rules() > self.profile.max_hidden_by_default {
            issues.push(Issue::new(
                Severity::Warning,
                "accessibility",
                "Multiple elements default to opacity:0, content may be hidden without JavaScript",
            ));
        }

        // === Interaction Checks ===
        if !scan.has_hover_states() {
            issues.push(Issue::new(
                Severity::Warning,
                "interactivity",
                "No hover states detected on any element",
            ));
        }
        if !scan.has_smooth_scroll() {
            issues.push(Issue::new(Severity::Info, "ux", "Missing smooth scroll behavior").fixable());
        }

        // === Content Checks ===
        let sections = scan.section_count();
        if sections < self.profile.min_sections {
            issues.push(Issue::new(
                Severity::Warning,
                "content",
                format!("Only {sections} sections found, expected at least 5 for a complete landing page"),
            ));
        }
        if !scan.has_navigation() {
            issues.push(Issue::new(Severity::Warning, "structure", "No navigation/header element found"));
        }
        if !scan.has_footer() {
            issues.push(Issue::new(Severity::Info, "structure", "No footer element found"));
        }

        // === Dependency Checks ===
        if scan.icons_without_library() {
            issues.push(Issue::new(
                Severity::Warning,
                "dependencies",
                "Lucide icon attributes found but library not loaded",
            ));
        }

        let report = QualityReport::from_issues(issues, collect_metrics(&scan));
        tracing::debug!(
            profile = %self.profile.name,
            score = report.score,
            passed = report.passed,
            issues = report.issues.len(),
            "document validated"
        );
        report
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(QualityProfile::default())
    }
}
