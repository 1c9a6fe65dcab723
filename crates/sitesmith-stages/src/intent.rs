//! Stage 1: intent classification
//!
//! One low-temperature structured call turns the free-text request into an
//! `IntentResult`. The response is read leniently: only the category and
//! mood matter enough to fail on, everything else is defaulted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::prompts::{self, INTENT_SYSTEM};
use sitesmith_core::{ClarifyingQuestion, ContentHints, IntentResult, Result, SmithError};
use sitesmith_gateway::{call_structured, CallOptions, LlmGateway, Message};

const INTENT_MAX_TOKENS: u32 = 1000;
const INTENT_TEMPERATURE: f32 = 0.3;

const FALLBACK_SITE_TYPE: &str = "startup_landing";
const FALLBACK_MOOD: &str = "dark_futuristic";
const FALLBACK_CONFIDENCE: f64 = 0.3;
const UNSTATED_CONFIDENCE: f64 = 0.5;

static QUOTED_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("quoted pattern"));

static INTRODUCED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:for|called|named)\s+([A-Z][a-zA-Z]+(?:\s[A-Z][a-zA-Z]+)?)").expect("name pattern")
});

static CAMEL_CASE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+(?:[A-Z][a-z]+)+)\b").expect("camel pattern"));

/// Sections planned when the model suggests none.
pub const DEFAULT_SECTIONS: [&str; 5] = ["hero", "features", "testimonials", "cta", "footer"];

/// The model's answer before defaults are applied. A field of the wrong
/// type reads as absent instead of failing the whole reply.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawIntent {
    #[serde(deserialize_with = "lenient")]
    site_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    industry: Option<String>,
    #[serde(deserialize_with = "lenient")]
    business_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    mood: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    suggested_sections: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_list")]
    required_features: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    content_hints: Option<ContentHints>,
    #[serde(deserialize_with = "lenient_list")]
    image_keywords: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    subject_details: Option<String>,
    #[serde(deserialize_with = "lenient")]
    target_audience: Option<String>,
    #[serde(deserialize_with = "lenient")]
    primary_action: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    unique_selling_points: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_number")]
    confidence: Option<f64>,
    #[serde(deserialize_with = "lenient_list")]
    clarifying_questions: Option<Vec<ClarifyingQuestion>>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Keeps the well-formed items of an array.
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}

/// Numbers, or numbers written as strings.
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawIntent {
    fn normalize(self, prompt: &str) -> Result<IntentResult> {
        let site_type = non_empty(self.site_type);
        let mood = non_empty(self.mood);
        if site_type.is_none() && mood.is_none() {
            return Err(SmithError::Schema(
                "Intent classification missing required fields (siteType, mood)".to_string(),
            ));
        }

        // Zero and NaN read as "not stated".
        let confidence = match self.confidence {
            Some(c) if c.is_finite() && c != 0.0 => c.clamp(0.0, 1.0),
            _ => UNSTATED_CONFIDENCE,
        };

        Ok(IntentResult {
            site_type: site_type.unwrap_or_else(|| FALLBACK_SITE_TYPE.to_string()),
            industry: non_empty(self.industry).unwrap_or_else(|| "general".to_string()),
            business_name: non_empty(self.business_name).unwrap_or_else(|| extract_business_name(prompt)),
            mood: mood.unwrap_or_else(|| FALLBACK_MOOD.to_string()),
            suggested_sections: self
                .suggested_sections
                .filter(|s| !s.is_empty())
                .unwrap_or_else(default_sections),
            required_features: self.required_features.unwrap_or_default(),
            content_hints: self.content_hints.unwrap_or_default(),
            image_keywords: self.image_keywords.filter(|k| !k.is_empty()),
            subject_details: non_empty(self.subject_details),
            target_audience: non_empty(self.target_audience),
            primary_action: non_empty(self.primary_action),
            unique_selling_points: self.unique_selling_points.filter(|p| !p.is_empty()),
            confidence,
            clarifying_questions: self.clarifying_questions.filter(|q| !q.is_empty()),
        })
    }
}

/// Classifies `prompt` into site category, mood and content requirements.
pub async fn classify_intent(
    prompt: &str,
    gateway: &dyn LlmGateway,
    options: CallOptions,
) -> Result<IntentResult> {
    let messages = vec![
        Message::system(prompts::render(INTENT_SYSTEM, &json!({}))?),
        Message::user(prompt),
    ];
    let options = options.max_tokens(INTENT_MAX_TOKENS).temperature(INTENT_TEMPERATURE);

    let raw: RawIntent = call_structured(gateway, &messages, &options).await?;
    let intent = raw.normalize(prompt)?;
    tracing::debug!(
        site_type = %intent.site_type,
        mood = %intent.mood,
        confidence = intent.confidence,
        "intent classified"
    );
    Ok(intent)
}

pub(crate) fn default_sections() -> Vec<String> {
    DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect()
}

/// Low-confidence intent used when classification fails.
pub fn fallback_intent(prompt: &str) -> IntentResult {
    IntentResult {
        site_type: FALLBACK_SITE_TYPE.to_string(),
        industry: "technology".to_string(),
        business_name: extract_business_name(prompt),
        mood: FALLBACK_MOOD.to_string(),
        suggested_sections: default_sections(),
        required_features: vec!["responsive".to_string(), "animations".to_string()],
        content_hints: ContentHints::default(),
        image_keywords: None,
        subject_details: None,
        target_audience: None,
        primary_action: None,
        unique_selling_points: None,
        confidence: FALLBACK_CONFIDENCE,
        clarifying_questions: None,
    }
}

/// Best-effort business name: quoted text, then "for/called/named X",
/// then a CamelCase token, else "Company".
pub fn extract_business_name(prompt: &str) -> String {
    [&*QUOTED_NAME, &*INTRODUCED_NAME, &*CAMEL_CASE_NAME]
        .iter()
        .find_map(|pattern| pattern.captures(prompt).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Company".to_string())
}
