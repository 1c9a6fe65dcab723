//! Optional model-backed repair pass for low-scoring documents

use crate::gate::QualityGate;
use crate::profile::ReviewPolicy;
use sitesmith_core::{QualityReport, Result, Severity, StyleSystem};
use sitesmith_gateway::{extract_markup, has_document_marker, CallOptions, LlmGateway, Message};

const REVIEW_MAX_TOKENS: u32 = 16_000;
const REVIEW_TEMPERATURE: f32 = 0.3;

fn review_instruction(style: &StyleSystem, report: &QualityReport) -> String {
    let issues: Vec<String> = report
        .issues
        .iter()
        .filter(|i| i.severity != Severity::Info)
        .map(|i| format!("- [{}] {}: {}", i.severity.as_str(), i.category, i.message))
        .collect();
    let issues = if issues.is_empty() {
        "No major issues found.".to_string()
    } else {
        issues.join("\n")
    };

    format!(
        "Review and fix this HTML page. The automated quality check found these issues:\n\n\
{issues}\n\n\
Quality score: {score}/100\n\n\
Design system reference:\n\
- Primary color: {primary}\n\
- Background: {background}\n\
- Display font: {display}\n\
- Body font: {body}\n\n\
RULES:\n\
1. Fix ALL listed issues\n\
2. Ensure ALL colors use the design system (no framework default colors)\n\
3. Ensure ALL interactive elements have hover states\n\
4. Ensure the hero headline is large ({hero})\n\
5. Ensure content is visible without JavaScript (no opacity:0 defaults)\n\
6. Output the COMPLETE fixed HTML with no explanation and no markdown\n\
7. If the page is already good (score > 90 and no critical/warning issues), output it unchanged\n\n\
Start with <!DOCTYPE html>.",
        score = report.score,
        primary = style.colors.primary,
        background = style.colors.background,
        display = style.fonts.display,
        body = style.fonts.body,
        hero = style.typography.hero_size,
    )
}

/// Asks the model to repair `html` given the issue list and returns the
/// extracted markup. The caller re-validates and applies the length guard.
pub async fn llm_review_pass(
    html: &str,
    style: &StyleSystem,
    report: &QualityReport,
    gateway: &dyn LlmGateway,
    options: CallOptions,
) -> Result<String> {
    let messages = vec![
        Message::system(review_instruction(style, report)),
        Message::user(html),
    ];
    let options = options.max_tokens(REVIEW_MAX_TOKENS).temperature(REVIEW_TEMPERATURE);
    let raw = gateway.call(&messages, &options).await?;
    Ok(extract_markup(&raw))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    /// Reviewed markup replaced the original and was re-validated.
    Applied,
    /// Reviewed markup was too short to trust.
    Discarded { reviewed_len: usize },
    /// The reply carried no document, only prose.
    NotADocument { reviewed_len: usize },
    /// The review call failed; the original stands.
    Failed(String),
}

/// Runs the review pass and keeps its output only if it is still a document
/// and passes the length guard. Any failure leaves `html` and `report`
/// untouched.
pub async fn review_and_revalidate(
    html: &mut String,
    report: &mut QualityReport,
    style: &StyleSystem,
    gate: &QualityGate,
    policy: &ReviewPolicy,
    gateway: &dyn LlmGateway,
    options: CallOptions,
) -> ReviewOutcome {
    match llm_review_pass(html, style, report, gateway, options).await {
        Ok(reviewed) if !has_document_marker(&reviewed) => {
            tracing::warn!(reviewed_len = reviewed.len(), "review reply has no document, keeping original");
            ReviewOutcome::NotADocument { reviewed_len: reviewed.len() }
        }
        Ok(reviewed) if policy.accepts(html.len(), reviewed.len()) => {
            let before = report.score;
            *report = gate.validate(&reviewed, Some(style));
            *html = reviewed;
            tracing::info!(before, after = report.score, "review pass applied");
            ReviewOutcome::Applied
        }
        Ok(reviewed) => {
            tracing::warn!(
                original_len = html.len(),
                reviewed_len = reviewed.len(),
                "review output collapsed, keeping original"
            );
            ReviewOutcome::Discarded { reviewed_len: reviewed.len() }
        }
        Err(err) => {
            tracing::warn!(error = %err, "review pass failed, keeping original");
            ReviewOutcome::Failed(err.to_string())
        }
    }
}
