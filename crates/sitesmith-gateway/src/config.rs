//! Gateway configuration and model aliasing
use std::time::Duration;

use crate::retry::RetryPolicy;
use sitesmith_core::DEFAULT_MODEL;

/// Concrete provider model every alias resolves to.
pub const PROVIDER_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Provider model behind the opus aliases.
pub const OPUS_PROVIDER_MODEL: &str = "claude-opus-4-5-20251101";

/// Names callers may request.
pub const SUPPORTED_MODELS: &[&str] = &[
    "anthropic/claude-sonnet-4-5",
    "claude-sonnet-4-5",
    PROVIDER_MODEL,
    "anthropic/claude-opus-4-5",
    "claude-opus-4-5",
    OPUS_PROVIDER_MODEL,
];

const MODEL_ALIASES: &[(&str, &str)] = &[
    ("anthropic/claude-sonnet-4-5", PROVIDER_MODEL),
    ("claude-sonnet-4-5", PROVIDER_MODEL),
    ("anthropic/claude-opus-4-5", OPUS_PROVIDER_MODEL),
    ("claude-opus-4-5", OPUS_PROVIDER_MODEL),
];

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
    pub api_version: String,
    /// Beta header enabling prompt caching.
    pub beta: Option<String>,
    pub retry: RetryPolicy,
    pub buffered_timeout: Duration,
    pub streaming_timeout: Duration,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            default_model: DEFAULT_MODEL.to_string(),
            api_version: "2023-06-01".to_string(),
            beta: Some("prompt-caching-2024-07-31".to_string()),
            retry: RetryPolicy::default(),
            buffered_timeout: Duration::from_secs(180),
            streaming_timeout: Duration::from_secs(300),
            default_max_tokens: 4096,
            default_temperature: 0.7,
        }
    }
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    /// Maps an alias to the provider id; unknown names pass through.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        let name = requested.unwrap_or(&self.default_model);
        MODEL_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, id)| id.to_string())
            .unwrap_or_else(|| name.to_string())
    }
}
