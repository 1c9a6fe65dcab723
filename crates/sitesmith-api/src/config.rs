//! Server configuration read from the environment
use std::str::FromStr;

use sitesmith_core::{Result, SmithError, DEFAULT_MODEL};
use sitesmith_gateway::{GatewayConfig, RetryPolicy};
use sitesmith_quality::REVIEW_SCORE_THRESHOLD;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub gateway: GatewayConfig,
    pub review_threshold: u32,
}

impl ServerConfig {
    /// Reads `SITESMITH_*` and `ANTHROPIC_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("ANTHROPIC_API_KEY")
            .ok_or_else(|| SmithError::Config("ANTHROPIC_API_KEY not configured".to_string()))?;

        let mut gateway = GatewayConfig::new(api_key);
        if let Some(base_url) = get("ANTHROPIC_BASE_URL") {
            gateway = gateway.with_base_url(base_url);
        }
        gateway.default_model = get("SITESMITH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if let Some(raw) = get("SITESMITH_MAX_RETRIES") {
            let max_retries = parse_number("SITESMITH_MAX_RETRIES", &raw)?;
            gateway = gateway.with_retry(RetryPolicy {
                max_retries,
                ..RetryPolicy::default()
            });
        }

        let review_threshold = match get("SITESMITH_REVIEW_THRESHOLD") {
            Some(raw) => parse_number("SITESMITH_REVIEW_THRESHOLD", &raw)?,
            None => REVIEW_SCORE_THRESHOLD,
        };

        Ok(Self {
            addr: get("SITESMITH_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            gateway,
            review_threshold,
        })
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| SmithError::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8787");
        assert_eq!(config.gateway.api_key, "sk-test");
        assert_eq!(config.gateway.default_model, DEFAULT_MODEL);
        assert_eq!(config.gateway.retry.max_retries, 2);
        assert_eq!(config.review_threshold, 75);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = config(&[("ANTHROPIC_API_KEY", "  ")]).unwrap_err();
        assert_eq!(err.to_string(), "CONFIG/ANTHROPIC_API_KEY not configured");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("ANTHROPIC_BASE_URL", "http://127.0.0.1:9000/"),
            ("SITESMITH_ADDR", "127.0.0.1:3000"),
            ("SITESMITH_MAX_RETRIES", "0"),
            ("SITESMITH_REVIEW_THRESHOLD", "90"),
        ])
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:3000");
        assert_eq!(config.gateway.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.gateway.retry.max_retries, 0);
        assert_eq!(config.review_threshold, 90);
    }

    #[test]
    fn test_bad_number() {
        let err = config(&[("ANTHROPIC_API_KEY", "k"), ("SITESMITH_MAX_RETRIES", "lots")]).unwrap_err();
        assert!(matches!(err, SmithError::Config(_)));
    }
}
