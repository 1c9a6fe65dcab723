//! Data Model: the artifacts each stage hands to the next
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::stage::StageName;

// ============================================================================
// TIER
// ============================================================================

/// Quality tier selecting which stages hit the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    #[default]
    Balanced,
    Best,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Balanced => "balanced",
            Tier::Best => "best",
        }
    }

    /// Unknown or missing tier names fall back to `balanced`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Tier::Fast),
            "balanced" => Ok(Tier::Balanced),
            "best" => Ok(Tier::Best),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// STAGE 1: INTENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    pub site_type: String,
    pub industry: String,
    pub business_name: String,
    pub mood: String,
    pub suggested_sections: Vec<String>,
    pub required_features: Vec<String>,
    pub content_hints: ContentHints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_selling_points: Option<Vec<String>>,
    /// Always within [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub clarifying_questions: Option<Vec<ClarifyingQuestion>>,
}

/// What the request already supplies and what must be invented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentHints {
    #[serde(default)]
    pub has_logo: bool,
    #[serde(default)]
    pub has_copy: bool,
    #[serde(default)]
    pub has_images: bool,
    #[serde(default)]
    pub needs_generated: Vec<String>,
}

impl Default for ContentHints {
    fn default() -> Self {
        Self {
            has_logo: false,
            has_copy: false,
            has_images: false,
            needs_generated: ["headline", "subheadline", "features", "cta"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyingQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

// ============================================================================
// STAGE 2: STYLE SYSTEM
// ============================================================================

/// A complete visual specification. Colors are always concrete values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSystem {
    pub colors: Palette,
    pub fonts: FontPairing,
    pub typography: Typography,
    pub spacing: Spacing,
    pub effects: Effects,
    pub animations: Motion,
    pub layout_pattern: String,
    pub css_framework: String,
    pub icon_library: String,
    pub image_strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub background: String,
    pub foreground: String,
    pub card: String,
    pub card_foreground: String,
    pub primary: String,
    pub primary_glow: String,
    pub secondary: String,
    pub accent: String,
    pub muted: String,
    pub muted_foreground: String,
    pub border: String,
    pub destructive: String,
}

impl Palette {
    pub fn entries(&self) -> [(&'static str, &str); 12] {
        [
            ("background", &self.background),
            ("foreground", &self.foreground),
            ("card", &self.card),
            ("cardForeground", &self.card_foreground),
            ("primary", &self.primary),
            ("primaryGlow", &self.primary_glow),
            ("secondary", &self.secondary),
            ("accent", &self.accent),
            ("muted", &self.muted),
            ("mutedForeground", &self.muted_foreground),
            ("border", &self.border),
            ("destructive", &self.destructive),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontPairing {
    pub display: String,
    pub body: String,
    pub mono: String,
    pub google_import_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    pub hero_size: String,
    pub hero_weight: String,
    pub hero_letter_spacing: String,
    pub heading_size: String,
    pub body_size: String,
    pub body_line_height: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spacing {
    pub section_padding: String,
    pub card_padding: String,
    pub gap: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effects {
    pub border_radius: String,
    pub card_shadow: String,
    pub glass_bg: String,
    pub glass_backdrop: String,
    pub gradient_primary: String,
    pub hover_transition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Motion {
    pub fade_in_up: String,
    pub stagger_delay: String,
    pub scroll_reveal: bool,
    pub hover_scale: String,
    pub hover_lift: String,
}

impl StyleSystem {
    /// White or near-white backgrounds.
    pub fn is_light(&self) -> bool {
        let bg = self.colors.background.trim().to_ascii_lowercase();
        bg == "#ffffff" || bg.starts_with("#f")
    }

    /// Backgrounds in the `#0…`/`#1…` range.
    pub fn is_dark(&self) -> bool {
        let bg = self.colors.background.trim();
        bg.starts_with("#0") || bg.starts_with("#1")
    }
}

// ============================================================================
// STAGE 3: CONTENT PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPlan {
    pub sections: Vec<Section>,
    pub metadata: PlanMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub layout: String,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub visual_elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    pub total_sections: usize,
    pub estimated_scroll_length: String,
    pub mobile_layout: String,
    pub primary_cta: String,
    pub secondary_cta: String,
    /// Context threaded through from the intent (image keywords, audience, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlanMetadata {
    /// Metadata used when the planner omits it.
    pub fn for_section_count(count: usize) -> Self {
        Self {
            total_sections: count,
            estimated_scroll_length: format!("{} viewports", count.saturating_sub(1).max(3)),
            mobile_layout: "single_column_stack".to_string(),
            primary_cta: "Get Started".to_string(),
            secondary_cta: "Learn More".to_string(),
            extra: Map::new(),
        }
    }
}

impl ContentPlan {
    /// Number of neighbouring sections sharing a layout pattern.
    pub fn adjacent_layout_repeats(&self) -> usize {
        self.sections
            .windows(2)
            .filter(|pair| pair[0].layout == pair[1].layout)
            .count()
    }

    pub fn section_ids(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.id.as_str()).collect()
    }
}

// ============================================================================
// STAGE 5: QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// Score deduction applied per issue.
    pub fn penalty(&self) -> i32 {
        match self {
            Severity::Critical => 25,
            Severity::Warning => 8,
            Severity::Info => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    pub category: String,
    pub message: String,
    pub auto_fixable: bool,
}

impl Issue {
    pub fn new(severity: Severity, category: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.to_string(),
            message: message.into(),
            auto_fixable: false,
        }
    }

    pub fn fixable(mut self) -> Self {
        self.auto_fixable = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub html_size: usize,
    pub section_count: usize,
    pub has_responsive_design: bool,
    pub has_animations: bool,
    pub has_hover_states: bool,
    pub has_smooth_scroll: bool,
    pub has_meta_viewport: bool,
    pub font_count: usize,
    pub image_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub passed: bool,
    /// 0..=100
    pub score: u32,
    pub issues: Vec<Issue>,
    pub metrics: QualityMetrics,
}

impl QualityReport {
    /// Scores an issue list: `max(0, 100 - 25c - 8w - 2i)`, passing with no
    /// criticals and at most two warnings.
    pub fn from_issues(issues: Vec<Issue>, metrics: QualityMetrics) -> Self {
        let mut score = 100i32;
        for issue in &issues {
            score -= issue.severity.penalty();
        }
        let score = score.max(0);

        let criticals = issues.iter().filter(|i| i.severity == Severity::Critical).count();
        let warnings = issues.iter().filter(|i| i.severity == Severity::Warning).count();

        Self {
            passed: criticals == 0 && warnings <= 2,
            score: score as u32,
            issues,
            metrics,
        }
    }

    /// Terminal report used when no markup could be produced.
    pub fn generation_failure(reason: &str) -> Self {
        Self {
            passed: false,
            score: 0,
            issues: vec![Issue::new(
                Severity::Critical,
                "generation",
                format!("Code generation failed: {reason}"),
            )],
            metrics: QualityMetrics::default(),
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStageResult {
    pub stage: StageName,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineStageResult {
    pub fn skipped(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            duration_ms: 0,
            data: None,
            error: None,
        }
    }
}

/// Inbound request to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInput {
    pub prompt: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl PipelineInput {
    pub fn new(prompt: impl Into<String>, tier: Tier) -> Self {
        Self {
            prompt: prompt.into(),
            tier,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Final markup; empty when document generation failed.
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_system: Option<StyleSystem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_plan: Option<ContentPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentResult>,
    pub quality_report: QualityReport,
    pub stages: Vec<PipelineStageResult>,
    pub total_duration_ms: u64,
    pub model: String,
    pub tier: Tier,
}

impl PipelineResult {
    pub fn stage(&self, name: StageName) -> Option<&PipelineStageResult> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity) -> Issue {
        Issue::new(severity, "test", "x")
    }

    #[test]
    fn test_score_deductions() {
        let base = QualityReport::from_issues(vec![issue(Severity::Warning)], QualityMetrics::default());
        assert_eq!(base.score, 92);

        let mut with_critical = base.issues.clone();
        with_critical.push(issue(Severity::Critical));
        assert_eq!(QualityReport::from_issues(with_critical, QualityMetrics::default()).score, 67);

        let mut with_info = base.issues.clone();
        with_info.push(issue(Severity::Info));
        assert_eq!(QualityReport::from_issues(with_info, QualityMetrics::default()).score, 90);
    }

    #[test]
    fn test_score_floor_and_pass_rule() {
        let many = vec![issue(Severity::Critical); 5];
        let report = QualityReport::from_issues(many, QualityMetrics::default());
        assert_eq!(report.score, 0);
        assert!(!report.passed);

        let two_warnings = vec![issue(Severity::Warning), issue(Severity::Warning), issue(Severity::Info)];
        assert!(QualityReport::from_issues(two_warnings, QualityMetrics::default()).passed);

        let three_warnings = vec![issue(Severity::Warning); 3];
        assert!(!QualityReport::from_issues(three_warnings, QualityMetrics::default()).passed);
    }

    #[test]
    fn test_generation_failure_report() {
        let report = QualityReport::generation_failure("network down");
        assert_eq!(report.score, 0);
        assert_eq!(report.issues[0].severity, Severity::Critical);
        assert!(report.issues[0].message.contains("network down"));
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!(Tier::parse_or_default(Some("BEST")), Tier::Best);
        assert_eq!(Tier::parse_or_default(Some("turbo")), Tier::Balanced);
        assert_eq!(Tier::parse_or_default(None), Tier::Balanced);
    }

    #[test]
    fn test_section_type_field_on_wire() {
        let json = serde_json::json!({
            "id": "hero", "type": "hero", "layout": "hero_centered",
            "content": {"headline": "Ship faster"}, "visualElements": ["gradient"]
        });
        let section: Section = serde_json::from_value(json).unwrap();
        assert_eq!(section.kind, "hero");
        assert_eq!(serde_json::to_value(&section).unwrap()["type"], "hero");
    }

    #[test]
    fn test_metadata_defaults_and_extras() {
        let meta = PlanMetadata::for_section_count(2);
        assert_eq!(meta.estimated_scroll_length, "3 viewports");
        assert_eq!(PlanMetadata::for_section_count(7).estimated_scroll_length, "6 viewports");

        let mut meta = PlanMetadata::for_section_count(4);
        meta.extra.insert("targetAudience".into(), Value::from("founders"));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["targetAudience"], "founders");
        assert_eq!(json["primaryCta"], "Get Started");
    }

    #[test]
    fn test_adjacent_layout_repeats() {
        let section = |id: &str, layout: &str| Section {
            id: id.into(),
            kind: id.into(),
            layout: layout.into(),
            content: Map::new(),
            visual_elements: vec![],
        };
        let plan = ContentPlan {
            sections: vec![
                section("hero", "hero_centered"),
                section("features", "three_col_cards"),
                section("team", "three_col_cards"),
            ],
            metadata: PlanMetadata::for_section_count(3),
        };
        assert_eq!(plan.adjacent_layout_repeats(), 1);
    }
}
