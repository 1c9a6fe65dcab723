//! Sitesmith Quality: static analysis of generated markup
//!
//! Scores a document against a quality profile, applies the deterministic
//! auto-fixes, and runs the optional model-backed review pass.
//!
//! # Example
//!
//! ```ignore
//! use sitesmith_quality::{auto_fix, validate};
//!
//! let html = auto_fix(raw_html);
//! let report = validate(&html, Some(&style));
//! println!("score {} passed {}", report.score, report.passed);
//! ```

pub mod autofix;
pub mod checks;
pub mod gate;
pub mod metrics;
pub mod profile;
pub mod review;

pub use autofix::auto_fix;
pub use checks::MarkupScan;
pub use gate::QualityGate;
pub use metrics::collect_metrics;
pub use profile::{QualityProfile, ReviewPolicy, REVIEW_SCORE_THRESHOLD};
pub use review::{llm_review_pass, review_and_revalidate, ReviewOutcome};

use sitesmith_core::{QualityReport, StyleSystem};

/// Validates with the standard profile.
pub fn validate(html: &str, style: Option<&StyleSystem>) -> QualityReport {
    QualityGate::default().validate(html, style)
}
