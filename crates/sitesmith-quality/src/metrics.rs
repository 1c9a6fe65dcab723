//! Metrics snapshot attached to every quality report

use crate::checks::MarkupScan;
use sitesmith_core::QualityMetrics;

pub fn collect_metrics(scan: &MarkupScan<'_>) -> QualityMetrics {
    QualityMetrics {
        html_size: scan.html().len(),
        section_count: scan.section_count(),
        has_responsive_design: scan.has_media_queries()
            || scan.has_utility_framework()
            || scan.has_fluid_sizing(),
        has_animations: scan.has_animations(),
        has_hover_states: scan.has_hover_states(),
        has_smooth_scroll: scan.has_smooth_scroll(),
        has_meta_viewport: scan.mentions_viewport(),
        font_count: scan.font_count(),
        image_count: scan.image_tags().len(),
    }
}
