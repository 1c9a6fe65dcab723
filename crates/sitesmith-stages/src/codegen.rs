//! Stage 4: document generation
//!
//! Builds the instruction from the style system and content plan, asks for
//! the full document (buffered or streamed), and extracts the markup.

use chrono::Datelike;
use serde_json::{json, Value};

use crate::prompts::{self, CODEGEN_SYSTEM, CODEGEN_USER, ITERATE_SYSTEM};
use sitesmith_core::{ContentPlan, IntentResult, Result, SmithError, StyleSystem};
use sitesmith_gateway::{extract_markup, CallOptions, LlmGateway, Message};

const CODEGEN_MAX_TOKENS: u32 = 16_000;
const CODEGEN_TEMPERATURE: f32 = 0.6;
const ITERATE_TEMPERATURE: f32 = 0.5;

const HERO_IMAGE_SIZE: &str = "1200/800";
const IMAGE_SIZE: &str = "800/600";

/// One picsum seed per image keyword; the first is sized for the hero.
fn image_seeds(plan: &ContentPlan) -> Vec<Value> {
    let keywords = plan
        .metadata
        .extra
        .get("imageKeywords")
        .and_then(Value::as_array)
        .map(|k| k.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    keywords
        .iter()
        .enumerate()
        .map(|(i, keyword)| {
            let seed = keyword.split_whitespace().collect::<Vec<_>>().join("-");
            json!({
                "number": i + 1,
                "seed": seed,
                "size": if i == 0 { HERO_IMAGE_SIZE } else { IMAGE_SIZE },
            })
        })
        .collect()
}

fn metadata_text<'a>(plan: &'a ContentPlan, key: &str) -> Option<&'a str> {
    plan.metadata
        .extra
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// System and user messages for document generation.
pub fn codegen_messages(
    prompt: &str,
    intent: &IntentResult,
    style: &StyleSystem,
    plan: &ContentPlan,
) -> Result<Vec<Message>> {
    let sections_json = serde_json::to_string_pretty(&plan.sections)
        .map_err(|e| SmithError::Template(format!("content plan: {e}")))?;

    let system = prompts::render(
        CODEGEN_SYSTEM,
        &json!({
            "style": style,
            "light": style.is_light(),
            "sections_json": sections_json,
            "subject_details": metadata_text(plan, "subjectDetails"),
            "target_audience": metadata_text(plan, "targetAudience"),
            "primary_action": metadata_text(plan, "primaryAction"),
            "image_seeds": image_seeds(plan),
            "year": chrono::Utc::now().year(),
        }),
    )?;
    let user = prompts::render(CODEGEN_USER, &json!({ "prompt": prompt, "intent": intent }))?;

    Ok(vec![Message::system(system), Message::user(user)])
}

/// Extracts the markup and rejects output without a document marker.
pub fn ensure_document(raw: &str) -> Result<String> {
    let html = extract_markup(raw);
    let lower = html.to_ascii_lowercase();
    if !lower.contains("<!doctype") && !lower.contains("<html") {
        return Err(SmithError::Schema("Code generation did not produce valid HTML".to_string()));
    }
    Ok(html)
}

fn codegen_options(options: CallOptions) -> CallOptions {
    options.max_tokens(CODEGEN_MAX_TOKENS).temperature(CODEGEN_TEMPERATURE)
}

/// Buffered document generation.
pub async fn generate_document(
    prompt: &str,
    intent: &IntentResult,
    style: &StyleSystem,
    plan: &ContentPlan,
    gateway: &dyn LlmGateway,
    options: CallOptions,
) -> Result<String> {
    let messages = codegen_messages(prompt, intent, style, plan)?;
    let raw = gateway.call(&messages, &codegen_options(options)).await?;
    let html = ensure_document(&raw)?;
    tracing::debug!(chars = html.len(), "document generated");
    Ok(html)
}

/// Streaming document generation. `on_chunk(delta, accumulated)` sees every
/// provider delta unmodified and in order.
pub async fn generate_document_streaming(
    prompt: &str,
    intent: &IntentResult,
    style: &StyleSystem,
    plan: &ContentPlan,
    gateway: &dyn LlmGateway,
    options: CallOptions,
    on_chunk: &mut (dyn FnMut(&str, &str) + Send),
) -> Result<String> {
    let messages = codegen_messages(prompt, intent, style, plan)?;
    let raw = gateway
        .call_streaming(&messages, &codegen_options(options), on_chunk)
        .await?;
    let html = ensure_document(&raw)?;
    tracing::debug!(chars = html.len(), "document streamed");
    Ok(html)
}

/// Regenerates the document from a conversation while keeping `style`.
pub async fn iterate_document(
    history: &[Message],
    style: &StyleSystem,
    gateway: &dyn LlmGateway,
    options: CallOptions,
) -> Result<String> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(prompts::render(ITERATE_SYSTEM, &json!({ "style": style }))?));
    messages.extend(history.iter().cloned());

    let options = options.max_tokens(CODEGEN_MAX_TOKENS).temperature(ITERATE_TEMPERATURE);
    let raw = gateway.call(&messages, &options).await?;
    ensure_document(&raw)
}
