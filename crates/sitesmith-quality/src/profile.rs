//! Quality profiles and the review gating policy

use serde::{Deserialize, Serialize};
use sitesmith_core::Tier;

/// Score below which the `best` tier asks the model to repair the page.
pub const REVIEW_SCORE_THRESHOLD: u32 = 75;

/// Thresholds and pattern lists the gate checks against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Profile name (e.g., "standard@1.0")
    pub name: String,

    /// Fewer `<section>` elements than this is a warning
    pub min_sections: usize,

    /// More rules than this hiding content with `opacity: 0` is a warning
    pub max_hidden_by_default: usize,

    /// Framework utility classes that bypass the style system palette
    pub framework_default_classes: Vec<String>,

    /// Hosts serving placeholder images
    pub placeholder_hosts: Vec<String>,
}

impl QualityProfile {
    pub fn standard() -> Self {
        Self {
            name: "standard@1.0".to_string(),
            min_sections: 3,
            max_hidden_by_default: 2,
            framework_default_classes: ["bg-blue-", "bg-indigo-", "text-blue-", "text-indigo-", "bg-gray-"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            placeholder_hosts: ["placehold.co", "placeholder.com", "via.placeholder"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Load profile from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| e.to_string())
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::standard()
    }
}

/// When the review pass runs and when its output is kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    pub threshold: u32,
    /// Reviewed markup shorter than this fraction of the original is discarded.
    pub min_length_ratio: f64,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            threshold: REVIEW_SCORE_THRESHOLD,
            min_length_ratio: 0.5,
        }
    }
}

impl ReviewPolicy {
    pub fn with_threshold(threshold: u32) -> Self {
        Self { threshold, ..Self::default() }
    }

    /// Only the `best` tier reviews, and only below the threshold.
    pub fn should_review(&self, tier: Tier, score: u32) -> bool {
        tier == Tier::Best && score < self.threshold
    }

    /// A review that collapsed the document signals a truncated response.
    pub fn accepts(&self, original_len: usize, reviewed_len: usize) -> bool {
        reviewed_len as f64 > original_len as f64 * self.min_length_ratio
    }
}
