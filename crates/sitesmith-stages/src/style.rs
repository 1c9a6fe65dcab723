//! Stage 2: style system generation
//!
//! The model's answer is validated for the four tokens nothing downstream
//! can do without, then laid over the template for the intent's mood so
//! every optional token the model skipped still has a concrete value.

use serde_json::{json, Map, Value};

use crate::prompts::{self, DESIGN_SYSTEM, DESIGN_USER};
use sitesmith_core::{IntentResult, Result, SmithError, StyleSystem};
use sitesmith_gateway::{call_structured, CallOptions, LlmGateway, Message};

const DESIGN_MAX_TOKENS: u32 = 2000;
const DESIGN_TEMPERATURE: f32 = 0.8;

const COLOR_FUNCTIONS: [&str; 4] = ["rgb(", "rgba(", "hsl(", "hsla("];

/// Generates a style system for the request, filling gaps from `template`.
pub async fn generate_style_system(
    prompt: &str,
    intent: &IntentResult,
    template: &StyleSystem,
    gateway: &dyn LlmGateway,
    options: CallOptions,
) -> Result<StyleSystem> {
    let messages = vec![
        Message::system(prompts::render(DESIGN_SYSTEM, &json!({}))?),
        Message::user(prompts::render(
            DESIGN_USER,
            &json!({ "prompt": prompt, "intent": intent }),
        )?),
    ];
    let options = options.max_tokens(DESIGN_MAX_TOKENS).temperature(DESIGN_TEMPERATURE);

    let raw: Value = call_structured(gateway, &messages, &options).await?;
    let style = complete_style_system(raw, template)?;
    tracing::debug!(
        primary = %style.colors.primary,
        display = %style.fonts.display,
        layout = %style.layout_pattern,
        "style system generated"
    );
    Ok(style)
}

/// Validates a raw model answer and completes it from `template`.
pub fn complete_style_system(raw: Value, template: &StyleSystem) -> Result<StyleSystem> {
    if !has_text(&raw, &["colors", "background"]) || !has_text(&raw, &["colors", "primary"]) {
        return Err(SmithError::Schema("Design system missing required color fields".to_string()));
    }
    if !has_text(&raw, &["fonts", "display"]) || !has_text(&raw, &["fonts", "body"]) {
        return Err(SmithError::Schema("Design system missing required font fields".to_string()));
    }

    let mut merged = serde_json::to_value(template)
        .map_err(|e| SmithError::Schema(format!("template style system: {e}")))?;
    overlay(&mut merged, raw);

    let mut style: StyleSystem = serde_json::from_value(merged)
        .map_err(|e| SmithError::Schema(format!("Design system has an invalid shape: {e}")))?;
    replace_abstract_colors(&mut style, template);
    Ok(style)
}

fn has_text(value: &Value, path: &[&str]) -> bool {
    path.iter()
        .try_fold(value, |node, key| node.get(key))
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

/// Copies `patch` onto `base`. Objects merge key by key; a leaf only
/// replaces a leaf of the same JSON type, so `null`, empty strings and
/// mistyped values keep the template's value.
fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => overlay_object(base, patch),
        (Value::String(base), Value::String(patch)) if !patch.trim().is_empty() => *base = patch,
        (Value::Bool(base), Value::Bool(patch)) => *base = patch,
        (Value::Number(base), Value::Number(patch)) => *base = patch,
        _ => {}
    }
}

fn overlay_object(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        if let Some(slot) = base.get_mut(&key) {
            overlay(slot, value);
        }
    }
}

/// Hex values and CSS color functions count as concrete.
pub fn is_concrete_color(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    COLOR_FUNCTIONS.iter().any(|f| value.starts_with(f))
        && value.ends_with(')')
        && value.chars().any(|c| c.is_ascii_digit())
}

/// Named colors ("blue") and placeholders ("#hex") fall back to the template.
fn replace_abstract_colors(style: &mut StyleSystem, template: &StyleSystem) {
    let colors = &mut style.colors;
    let fallback = &template.colors;
    let slots = [
        (&mut colors.background, &fallback.background),
        (&mut colors.foreground, &fallback.foreground),
        (&mut colors.card, &fallback.card),
        (&mut colors.card_foreground, &fallback.card_foreground),
        (&mut colors.primary, &fallback.primary),
        (&mut colors.primary_glow, &fallback.primary_glow),
        (&mut colors.secondary, &fallback.secondary),
        (&mut colors.accent, &fallback.accent),
        (&mut colors.muted, &fallback.muted),
        (&mut colors.muted_foreground, &fallback.muted_foreground),
        (&mut colors.border, &fallback.border),
        (&mut colors.destructive, &fallback.destructive),
    ];
    for (slot, default) in slots {
        if !is_concrete_color(slot) {
            tracing::debug!(value = %slot, replacement = %default, "abstract color replaced");
            *slot = default.clone();
        }
    }
}
