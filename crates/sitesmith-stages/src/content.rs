//! Stage 3: content planning
//!
//! Either asks the model for the full copy and section order, or (when the
//! tier skips the call) synthesizes a plan from the intent alone.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::intent::default_sections;
use crate::prompts::{self, CONTENT_SYSTEM, CONTENT_USER};
use sitesmith_core::{ContentPlan, IntentResult, PlanMetadata, Result, Section, SmithError, StyleSystem};
use sitesmith_gateway::{call_structured, CallOptions, LlmGateway, Message};

const CONTENT_MAX_TOKENS: u32 = 4000;
const CONTENT_TEMPERATURE: f32 = 0.8;

const FALLBACK_LAYOUT: &str = "three_col_cards";

const LAYOUTS: &[(&str, &str)] = &[
    ("hero", "hero_centered"),
    ("features", "three_col_cards"),
    ("social_proof", "stats_bar"),
    ("showcase", "two_col_split"),
    ("stats", "stats_bar"),
    ("testimonials", "testimonial_cards"),
    ("pricing", "pricing_table"),
    ("cta", "cta_banner"),
    ("footer", "multi_col_footer"),
    ("about", "two_col_split"),
    ("services", "icon_grid"),
    ("contact", "two_col_split"),
    ("faq", "alternating_rows"),
    ("team", "three_col_cards"),
    ("portfolio", "bento_grid"),
    ("blog", "three_col_cards"),
    ("how_it_works", "alternating_rows"),
];

/// Default layout pattern for a section kind.
pub fn default_layout(kind: &str) -> &'static str {
    LAYOUTS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, layout)| *layout)
        .unwrap_or(FALLBACK_LAYOUT)
}

// ============================================================================
// MODEL ANSWER
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPlan {
    sections: Option<Vec<RawSection>>,
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSection {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    layout: Option<String>,
    content: Option<Map<String, Value>>,
    visual_elements: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMetadata {
    total_sections: Option<usize>,
    estimated_scroll_length: Option<String>,
    mobile_layout: Option<String>,
    primary_cta: Option<String>,
    secondary_cta: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RawSection {
    fn into_section(self, index: usize) -> Section {
        let id = self
            .id
            .or_else(|| self.kind.clone())
            .unwrap_or_else(|| format!("section-{}", index + 1));
        let kind = self.kind.unwrap_or_else(|| id.clone());
        let layout = self.layout.unwrap_or_else(|| default_layout(&kind).to_string());
        Section {
            id,
            kind,
            layout,
            content: self.content.unwrap_or_default(),
            visual_elements: self.visual_elements.unwrap_or_default(),
        }
    }
}

impl RawMetadata {
    fn complete(self, section_count: usize) -> PlanMetadata {
        let defaults = PlanMetadata::for_section_count(section_count);
        PlanMetadata {
            total_sections: self.total_sections.unwrap_or(defaults.total_sections),
            estimated_scroll_length: self.estimated_scroll_length.unwrap_or(defaults.estimated_scroll_length),
            mobile_layout: self.mobile_layout.unwrap_or(defaults.mobile_layout),
            primary_cta: self.primary_cta.unwrap_or(defaults.primary_cta),
            secondary_cta: self.secondary_cta.unwrap_or(defaults.secondary_cta),
            extra: self.extra,
        }
    }
}

impl RawPlan {
    fn into_plan(self) -> Result<ContentPlan> {
        let sections: Vec<Section> = self
            .sections
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.into_section(i))
            .collect();
        if sections.is_empty() {
            return Err(SmithError::Schema("Content plan has no sections".to_string()));
        }

        let metadata = match self.metadata {
            Some(raw) => raw.complete(sections.len()),
            None => PlanMetadata::for_section_count(sections.len()),
        };
        Ok(ContentPlan { sections, metadata })
    }
}

// ============================================================================
// STAGE
// ============================================================================

/// Plans copy and section order. `style` only frames tone; nothing from it
/// is written into the plan.
pub async fn generate_content_plan(
    prompt: &str,
    intent: &IntentResult,
    style: &StyleSystem,
    gateway: &dyn LlmGateway,
    options: CallOptions,
) -> Result<ContentPlan> {
    let messages = vec![
        Message::system(prompts::render(CONTENT_SYSTEM, &json!({}))?),
        Message::user(prompts::render(
            CONTENT_USER,
            &json!({
                "prompt": prompt,
                "intent": intent,
                "style": style,
                "dark": style.is_dark(),
            }),
        )?),
    ];
    let options = options.max_tokens(CONTENT_MAX_TOKENS).temperature(CONTENT_TEMPERATURE);

    let raw: RawPlan = call_structured(gateway, &messages, &options).await?;
    let plan = raw.into_plan()?;

    let repeats = plan.adjacent_layout_repeats();
    if repeats > 0 {
        tracing::debug!(repeats, "content plan repeats a layout in adjacent sections");
    }
    tracing::debug!(sections = plan.sections.len(), "content plan generated");
    Ok(plan)
}

/// Minimal plan built from the intent's suggested sections, with no copy.
/// An intent without suggestions gets the default section list.
pub fn content_plan_from_intent(intent: &IntentResult) -> ContentPlan {
    let kinds = if intent.suggested_sections.is_empty() {
        default_sections()
    } else {
        intent.suggested_sections.clone()
    };
    let sections: Vec<Section> = kinds
        .into_iter()
        .map(|kind| Section {
            id: kind.clone(),
            layout: default_layout(&kind).to_string(),
            kind,
            content: Map::new(),
            visual_elements: Vec::new(),
        })
        .collect();
    let metadata = PlanMetadata::for_section_count(sections.len());
    ContentPlan { sections, metadata }
}

/// Copies the intent's subject context into the plan metadata so document
/// generation sees it.
pub fn thread_intent_context(plan: &mut ContentPlan, intent: &IntentResult) {
    let extra = &mut plan.metadata.extra;
    if let Some(keywords) = &intent.image_keywords {
        extra.insert("imageKeywords".to_string(), json!(keywords));
    }
    if let Some(details) = &intent.subject_details {
        extra.insert("subjectDetails".to_string(), json!(details));
    }
    if let Some(audience) = &intent.target_audience {
        extra.insert("targetAudience".to_string(), json!(audience));
    }
    if let Some(action) = &intent.primary_action {
        extra.insert("primaryAction".to_string(), json!(action));
    }
    if let Some(points) = &intent.unique_selling_points {
        extra.insert("uniqueSellingPoints".to_string(), json!(points));
    }
}
