use sitesmith_core::{QualityReport, Severity, SmithError, StyleSystem};
use sitesmith_gateway::{CallOptions, MockGateway};
use sitesmith_quality::{
    auto_fix, review_and_revalidate, validate, QualityGate, ReviewOutcome, ReviewPolicy,
};

const MINIMAL_VALID: &str = include_str!("fixtures/minimal_valid.html");
const BROKEN: &str = include_str!("fixtures/broken.html");
const STYLED_PAGE: &str = include_str!("fixtures/styled_page.html");

fn style() -> StyleSystem {
    serde_json::from_str(include_str!("fixtures/style_system.json")).unwrap()
}

fn has_message(report: &QualityReport, needle: &str) -> bool {
    report.issues.iter().any(|i| i.message.contains(needle))
}

#[test]
fn test_well_formed_page_passes() {
    let report = validate(MINIMAL_VALID, None);
    assert!(report.score >= 80, "score {}", report.score);
    assert!(report.passed);
    assert_eq!(report.count(Severity::Critical), 0);
}

#[test]
fn test_broken_fragment_scores_low() {
    let report = validate(BROKEN, None);
    assert!(report.score < 60);
    assert!(!report.passed);
    assert!(report.count(Severity::Critical) >= 2);
}

#[test]
fn test_missing_alt_text_reported() {
    let report = validate(BROKEN, None);
    let issue = report
        .issues
        .iter()
        .find(|i| i.category == "accessibility" && i.message.contains("alt text"))
        .unwrap();
    assert_eq!(issue.message, "1 image(s) missing alt text");
    assert_eq!(issue.severity, Severity::Warning);
}

#[test]
fn test_framework_default_colors_flagged_with_style() {
    let style = style();
    let html = MINIMAL_VALID.replace("<h1>Hero Section</h1>", "<h1 class=\"bg-blue-500\">Hero</h1>");
    let report = validate(&html, Some(&style));
    assert!(has_message(&report, "Tailwind default color classes"));

    // Without a style system the palette checks are skipped entirely.
    let report = validate(&html, None);
    assert!(!has_message(&report, "Tailwind default color classes"));
}

#[test]
fn test_style_fonts_and_palette_present() {
    let style = style();
    let report = validate(STYLED_PAGE, Some(&style));
    assert!(!has_message(&report, "display font"));
    assert!(!has_message(&report, "Primary color"));
    assert!(report.passed);
}

#[test]
fn test_missing_display_font_reported() {
    let mut style = style();
    style.fonts.display = "Playfair Display".to_string();
    let report = validate(STYLED_PAGE, Some(&style));
    assert!(has_message(
        &report,
        "Design system display font \"Playfair Display\" not found in HTML"
    ));
}

#[test]
fn test_metrics_snapshot() {
    let report = validate(STYLED_PAGE, Some(&style()));
    assert_eq!(report.metrics.section_count, 7);
    assert_eq!(report.metrics.image_count, 2);
    assert_eq!(report.metrics.font_count, 1);
    assert_eq!(report.metrics.html_size, STYLED_PAGE.len());
    assert!(report.metrics.has_smooth_scroll);
    assert!(report.metrics.has_meta_viewport);
}

#[test]
fn test_placeholder_images_flagged() {
    let html = STYLED_PAGE.replace(
        "https://images.unsplash.com/photo-1551434678-e076c223a692?w=800&q=80",
        "https://placehold.co/800x600",
    );
    let report = validate(&html, None);
    let issue = report.issues.iter().find(|i| i.message.contains("Placeholder")).unwrap();
    assert_eq!(issue.severity, Severity::Info);
}

#[test]
fn test_autofix_then_validate_clears_fixable_issues() {
    let html = "<html><head><title>x</title></head><body></body></html>";
    let before = validate(html, None);
    assert!(before.issues.iter().any(|i| i.auto_fixable));

    let fixed = auto_fix(html);
    let after = validate(&fixed, None);
    assert!(!after.issues.iter().any(|i| i.auto_fixable));
    assert!(after.score > before.score);
}

#[test]
fn test_autofix_keeps_existing_viewport() {
    let fixed = auto_fix(MINIMAL_VALID);
    assert_eq!(fixed.matches("viewport").count(), 1);
    assert_eq!(fixed, MINIMAL_VALID);
}

// ============================================================================
// Review pass
// ============================================================================

fn review_options() -> CallOptions {
    CallOptions::new("review")
}

#[tokio::test]
async fn test_review_applied_and_revalidated() {
    let style = style();
    let gate = QualityGate::default();
    let mut html = BROKEN.to_string();
    let mut report = gate.validate(&html, Some(&style));

    let gateway = MockGateway::new().respond("review", format!("```html\n{STYLED_PAGE}\n```"));
    let outcome = review_and_revalidate(
        &mut html,
        &mut report,
        &style,
        &gate,
        &ReviewPolicy::default(),
        &gateway,
        review_options(),
    )
    .await;

    assert_eq!(outcome, ReviewOutcome::Applied);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.ends_with("</html>"));
    assert!(report.passed);

    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].max_tokens, Some(16_000));
    assert_eq!(calls[0].temperature, Some(0.3));
    assert!(calls[0].messages[0].content.contains("Primary color: #06b6d4"));
    assert!(calls[0].messages[0].content.contains("missing alt text"));
}

#[tokio::test]
async fn test_collapsed_review_discarded() {
    let style = style();
    let gate = QualityGate::default();
    let mut html = MINIMAL_VALID.to_string();
    let mut report = gate.validate(&html, Some(&style));
    let original_report = report.clone();

    let gateway = MockGateway::new().respond("review", "<!DOCTYPE html><html><body></body></html>");
    let outcome = review_and_revalidate(
        &mut html,
        &mut report,
        &style,
        &gate,
        &ReviewPolicy::default(),
        &gateway,
        review_options(),
    )
    .await;

    assert!(matches!(outcome, ReviewOutcome::Discarded { .. }));
    assert_eq!(html, MINIMAL_VALID);
    assert_eq!(report, original_report);
}

#[tokio::test]
async fn test_prose_review_reply_discarded() {
    let style = style();
    let gate = QualityGate::default();
    let mut html = MINIMAL_VALID.to_string();
    let mut report = gate.validate(&html, Some(&style));
    let original_report = report.clone();

    let prose = "I reviewed the page and fixed the issues you listed. ".repeat(MINIMAL_VALID.len() / 20);
    assert!(prose.len() > MINIMAL_VALID.len());
    let gateway = MockGateway::new().respond("review", prose);
    let outcome = review_and_revalidate(
        &mut html,
        &mut report,
        &style,
        &gate,
        &ReviewPolicy::default(),
        &gateway,
        review_options(),
    )
    .await;

    assert!(matches!(outcome, ReviewOutcome::NotADocument { .. }));
    assert_eq!(html, MINIMAL_VALID);
    assert_eq!(report, original_report);
}

#[tokio::test]
async fn test_failed_review_keeps_original() {
    let style = style();
    let gate = QualityGate::default();
    let mut html = BROKEN.to_string();
    let mut report = gate.validate(&html, Some(&style));

    let gateway = MockGateway::new().fail("review", SmithError::RateLimited("slow down".into()));
    let outcome = review_and_revalidate(
        &mut html,
        &mut report,
        &style,
        &gate,
        &ReviewPolicy::default(),
        &gateway,
        review_options(),
    )
    .await;

    match outcome {
        ReviewOutcome::Failed(message) => assert!(message.starts_with("RATE/")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(html, BROKEN);
}
