//! Sitesmith Core: data model, error taxonomy and the stage wrapper
//!
//! Everything the pipeline crates share lives here: the typed artifacts each
//! stage produces, the run context with its cancellation token, and the event
//! channel the orchestrator writes progress to.

pub mod cancel;
pub mod context;
pub mod data_model;
pub mod error;
pub mod events;
pub mod stage;

pub use cancel::{CancellationToken, DropGuard};
pub use context::RunContext;
pub use data_model::{
    ClarifyingQuestion, ContentHints, ContentPlan, Effects, FontPairing, IntentResult, Issue,
    Motion, Palette, PipelineInput, PipelineResult, PipelineStageResult, PlanMetadata,
    QualityMetrics, QualityReport, Section, Severity, Spacing, StageStatus, StyleSystem, Tier,
    Typography,
};
pub use error::{Result, SmithError};
pub use events::{event_channel, EventSink, PipelineEvent};
pub use stage::{millis, run_stage, StageName};

/// Model requested when the caller names none.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4-5";
