//! Prometheus registry behind `/metrics`.
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use sitesmith_core::{PipelineResult, StageStatus};

const STAGE_BUCKETS: &[f64] = &[0.05, 0.25, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

pub struct Metrics {
    registry: Registry,
    runs: IntCounterVec,
    stage_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let runs = IntCounterVec::new(
            Opts::new("sitesmith_runs_total", "Pipeline runs by tier and outcome"),
            &["tier", "outcome"],
        )?;
        let stage_seconds = HistogramVec::new(
            HistogramOpts::new("sitesmith_stage_duration_seconds", "Stage wall time")
                .buckets(STAGE_BUCKETS.to_vec()),
            &["stage"],
        )?;
        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(stage_seconds.clone()))?;
        Ok(Self {
            registry,
            runs,
            stage_seconds,
        })
    }

    /// Counts the run and observes every stage that actually ran.
    pub fn record_run(&self, result: &PipelineResult) {
        self.runs
            .with_label_values(&[result.tier.as_str(), run_outcome(result)])
            .inc();
        for stage in result.stages.iter().filter(|s| s.status != StageStatus::Skipped) {
            self.stage_seconds
                .with_label_values(&[stage.stage.as_str()])
                .observe(stage.duration_ms as f64 / 1000.0);
        }
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

fn run_outcome(result: &PipelineResult) -> &'static str {
    if result.html.is_empty() {
        "failed"
    } else if result.quality_report.passed {
        "passed"
    } else {
        "below_bar"
    }
}
