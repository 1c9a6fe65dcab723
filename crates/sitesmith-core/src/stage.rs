//! Stage names and the uniform wrapper every fallible stage runs through
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::data_model::{PipelineStageResult, StageStatus};
use crate::error::Result;
use crate::events::{EventSink, PipelineEvent};

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Intent,
    Design,
    Content,
    Codegen,
    Quality,
}

impl StageName {
    pub const ALL: [StageName; 5] = [
        StageName::Intent,
        StageName::Design,
        StageName::Content,
        StageName::Codegen,
        StageName::Quality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Intent => "intent",
            StageName::Design => "design",
            StageName::Content => "content",
            StageName::Codegen => "codegen",
            StageName::Quality => "quality",
        }
    }

    /// Progress text shown when the stage starts.
    pub fn description(&self) -> &'static str {
        match self {
            StageName::Intent => "Analyzing your request...",
            StageName::Design => "Generating custom design system...",
            StageName::Content => "Planning content and structure...",
            StageName::Codegen => "Building your website...",
            StageName::Quality => "Running quality checks...",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs one stage, timing it and reporting progress on `events`.
///
/// Errors never escape: they become a `status: error` result and the caller
/// decides on a fallback. `project` picks what goes into the result payload.
pub async fn run_stage<T, Fut, P>(
    stage: StageName,
    description: &str,
    events: &EventSink,
    project: P,
    work: Fut,
) -> (Option<T>, PipelineStageResult)
where
    Fut: Future<Output = Result<T>>,
    P: FnOnce(&T) -> Option<Value>,
{
    let start = Instant::now();
    events.emit(PipelineEvent::StageStarted {
        stage,
        description: description.to_string(),
    });

    let outcome = work.await;
    let duration_ms = millis(start.elapsed());

    match outcome {
        Ok(value) => {
            tracing::info!(stage = %stage, duration_ms, "stage complete");
            let meta = PipelineStageResult {
                stage,
                status: StageStatus::Success,
                duration_ms,
                data: project(&value),
                error: None,
            };
            events.emit(PipelineEvent::StageCompleted(meta.clone()));
            (Some(value), meta)
        }
        Err(err) => {
            let message = err.to_string();
            tracing::warn!(stage = %stage, duration_ms, error = %message, "stage failed");
            events.emit(PipelineEvent::StageFailed {
                stage,
                error: message.clone(),
            });
            let meta = PipelineStageResult {
                stage,
                status: StageStatus::Error,
                duration_ms,
                data: None,
                error: Some(message),
            };
            events.emit(PipelineEvent::StageCompleted(meta.clone()));
            (None, meta)
        }
    }
}
