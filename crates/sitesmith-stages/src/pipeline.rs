//! Pipeline orchestrator
//!
//! Runs the stages for a tier, applies the per-stage fallbacks, and is the
//! error boundary for a whole run: `run` never returns an error. Only a
//! document generation failure ends a run early, as a terminal result with
//! empty markup.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::codegen::{generate_document, generate_document_streaming, iterate_document};
use crate::content::{content_plan_from_intent, generate_content_plan, thread_intent_context};
use crate::intent::{classify_intent, fallback_intent};
use crate::style::generate_style_system;
use crate::themes::StyleLibrary;
use sitesmith_core::{
    millis, run_stage, CancellationToken, ContentPlan, EventSink, IntentResult, PipelineEvent,
    PipelineInput, PipelineResult, PipelineStageResult, QualityReport, Result, RunContext,
    StageName, StyleSystem, Tier, DEFAULT_MODEL,
};
use sitesmith_gateway::{CallOptions, LlmGateway, Message};
use sitesmith_quality::{auto_fix, review_and_revalidate, QualityGate, ReviewPolicy};

const TEMPLATE_DESIGN_DESCRIPTION: &str = "Applying template design system...";
const REVIEW_DESCRIPTION: &str = "Running AI quality review...";

fn to_data<T: serde::Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

/// Markup after an iteration, auto-fixed and re-scored.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterateOutput {
    pub html: String,
    pub quality_report: QualityReport,
}

/// Runs generation for one request at a time; share it behind an `Arc`
/// to serve concurrent runs.
pub struct Pipeline {
    gateway: Arc<dyn LlmGateway>,
    gate: QualityGate,
    review: ReviewPolicy,
    styles: Arc<StyleLibrary>,
}

impl Pipeline {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            gate: QualityGate::default(),
            review: ReviewPolicy::default(),
            styles: Arc::new(StyleLibrary::builtin().clone()),
        }
    }

    pub fn with_quality_gate(mut self, gate: QualityGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_review_policy(mut self, review: ReviewPolicy) -> Self {
        self.review = review;
        self
    }

    pub fn with_style_library(mut self, styles: StyleLibrary) -> Self {
        self.styles = Arc::new(styles);
        self
    }

    pub fn review_policy(&self) -> &ReviewPolicy {
        &self.review
    }

    pub fn styles(&self) -> &StyleLibrary {
        &self.styles
    }

    /// Runs without an observer.
    pub async fn run(&self, input: PipelineInput) -> PipelineResult {
        self.run_observed(input, EventSink::disabled(), CancellationToken::new())
            .await
    }

    /// Runs with progress written to `events`. Document generation streams
    /// when the sink is live. Cancelling `cancel` aborts the in-flight call.
    pub async fn run_observed(
        &self,
        input: PipelineInput,
        events: EventSink,
        cancel: CancellationToken,
    ) -> PipelineResult {
        let model = input
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let ctx = RunContext::new(input.tier, model)
            .with_events(events)
            .with_cancel(cancel);

        let span = tracing::info_span!(
            "pipeline",
            trace_id = %ctx.trace_id,
            tier = %ctx.tier,
            model = %ctx.model
        );
        self.execute(&input.prompt, &ctx).instrument(span).await
    }

    fn options(&self, ctx: &RunContext, purpose: &'static str) -> CallOptions {
        CallOptions::new(purpose)
            .model(Some(ctx.model.clone()))
            .cancel(ctx.cancel.clone())
    }

    async fn execute(&self, prompt: &str, ctx: &RunContext) -> PipelineResult {
        let start = Instant::now();
        let gateway = self.gateway.as_ref();
        let mut stages: Vec<PipelineStageResult> = Vec::with_capacity(StageName::ALL.len());
        tracing::info!(prompt_chars = prompt.len(), "pipeline started");

        // ── Stage 1: intent ────────────────────────────────────────────────
        let (intent, meta) = run_stage(
            StageName::Intent,
            StageName::Intent.description(),
            &ctx.events,
            to_data::<IntentResult>,
            classify_intent(prompt, gateway, self.options(ctx, "intent")),
        )
        .await;
        stages.push(meta);
        let intent = intent.unwrap_or_else(|| fallback_intent(prompt));
        let template = self.styles.get(&intent.mood).clone();

        // ── Stages 2 + 3: style system and content plan ────────────────────
        let (style, plan) = match ctx.tier {
            Tier::Fast => {
                let (style, meta) = run_stage(
                    StageName::Design,
                    TEMPLATE_DESIGN_DESCRIPTION,
                    &ctx.events,
                    to_data::<StyleSystem>,
                    async { Ok(template.clone()) },
                )
                .await;
                stages.push(meta);
                stages.push(skip(StageName::Content, ctx));
                (style.unwrap_or_else(|| template.clone()), None)
            }
            Tier::Balanced => {
                let (style, meta) = run_stage(
                    StageName::Design,
                    StageName::Design.description(),
                    &ctx.events,
                    to_data::<StyleSystem>,
                    generate_style_system(prompt, &intent, &template, gateway, self.options(ctx, "design")),
                )
                .await;
                stages.push(meta);
                stages.push(skip(StageName::Content, ctx));
                (style.unwrap_or_else(|| template.clone()), None)
            }
            Tier::Best => {
                // The content call only needs tone, so it gets the template
                // and runs alongside the style call.
                let ((style, design_meta), (plan, content_meta)) = tokio::join!(
                    run_stage(
                        StageName::Design,
                        StageName::Design.description(),
                        &ctx.events,
                        to_data::<StyleSystem>,
                        generate_style_system(prompt, &intent, &template, gateway, self.options(ctx, "design")),
                    ),
                    run_stage(
                        StageName::Content,
                        StageName::Content.description(),
                        &ctx.events,
                        to_data::<ContentPlan>,
                        generate_content_plan(prompt, &intent, &template, gateway, self.options(ctx, "content")),
                    ),
                );
                stages.push(design_meta);
                stages.push(content_meta);
                (style.unwrap_or_else(|| template.clone()), plan)
            }
        };

        let mut plan = plan.unwrap_or_else(|| content_plan_from_intent(&intent));
        thread_intent_context(&mut plan, &intent);

        // ── Stage 4: document ──────────────────────────────────────────────
        let codegen_options = self.options(ctx, "codegen");
        let streaming = ctx.events.is_live();
        let events = ctx.events.clone();
        let mut relay = move |delta: &str, _accumulated: &str| {
            events.emit(PipelineEvent::Chunk {
                delta: delta.to_string(),
            });
        };
        let work = async {
            if streaming {
                generate_document_streaming(prompt, &intent, &style, &plan, gateway, codegen_options, &mut relay)
                    .await
            } else {
                generate_document(prompt, &intent, &style, &plan, gateway, codegen_options).await
            }
        };
        let (html, meta) = run_stage(
            StageName::Codegen,
            StageName::Codegen.description(),
            &ctx.events,
            |html: &String| Some(json!({ "chars": html.len(), "lines": html.lines().count() })),
            work,
        )
        .await;
        let failure = meta.error.clone();
        stages.push(meta);

        let Some(html) = html else {
            let reason = failure.unwrap_or_else(|| "Unknown error".to_string());
            tracing::error!(error = %reason, "document generation failed, ending run");
            return PipelineResult {
                html: String::new(),
                style_system: Some(style),
                content_plan: Some(plan),
                intent: Some(intent),
                quality_report: QualityReport::generation_failure(&reason),
                stages,
                total_duration_ms: millis(start.elapsed()),
                model: ctx.model.clone(),
                tier: ctx.tier,
            };
        };

        // ── Stage 5: quality ───────────────────────────────────────────────
        let (checked, meta) = run_stage(
            StageName::Quality,
            StageName::Quality.description(),
            &ctx.events,
            |(_, report): &(String, QualityReport)| to_data(report),
            self.check_quality(html, &style, ctx),
        )
        .await;
        stages.push(meta);
        let (html, quality_report) = checked.unwrap_or_else(missing_quality_report);

        tracing::info!(
            score = quality_report.score,
            passed = quality_report.passed,
            duration_ms = millis(start.elapsed()),
            "pipeline finished"
        );

        PipelineResult {
            html,
            style_system: Some(style),
            content_plan: Some(plan),
            intent: Some(intent),
            quality_report,
            stages,
            total_duration_ms: millis(start.elapsed()),
            model: ctx.model.clone(),
            tier: ctx.tier,
        }
    }

    /// Auto-fix, score, and (best tier, low score) one review pass.
    async fn check_quality(
        &self,
        html: String,
        style: &StyleSystem,
        ctx: &RunContext,
    ) -> Result<(String, QualityReport)> {
        let mut html = auto_fix(&html);
        let mut report = self.gate.validate(&html, Some(style));

        if self.review.should_review(ctx.tier, report.score) {
            ctx.events.emit(PipelineEvent::StageStarted {
                stage: StageName::Quality,
                description: REVIEW_DESCRIPTION.to_string(),
            });
            let outcome = review_and_revalidate(
                &mut html,
                &mut report,
                style,
                &self.gate,
                &self.review,
                self.gateway.as_ref(),
                self.options(ctx, "review"),
            )
            .await;
            tracing::debug!(?outcome, score = report.score, "review pass finished");
        }

        Ok((html, report))
    }

    /// Applies a follow-up edit to an existing document and re-scores it.
    pub async fn iterate(
        &self,
        history: &[Message],
        style: &StyleSystem,
        model: Option<String>,
    ) -> Result<IterateOutput> {
        let options = CallOptions::new("iterate").model(model);
        let html = iterate_document(history, style, self.gateway.as_ref(), options).await?;
        let html = auto_fix(&html);
        let quality_report = self.gate.validate(&html, Some(style));
        Ok(IterateOutput { html, quality_report })
    }
}

/// Records a stage the tier does not run; observers still get a completion.
fn skip(stage: StageName, ctx: &RunContext) -> PipelineStageResult {
    let meta = PipelineStageResult::skipped(stage);
    ctx.events.emit(PipelineEvent::StageCompleted(meta.clone()));
    meta
}

/// The quality stage cannot fail; this keeps the run total if it ever does.
fn missing_quality_report() -> (String, QualityReport) {
    (String::new(), QualityReport::generation_failure("quality stage produced no report"))
}
