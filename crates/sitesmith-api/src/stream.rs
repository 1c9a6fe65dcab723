//! Streaming protocol adapter
//!
//! Turns pipeline events into the outward frame vocabulary:
//!
//! ```text
//! stage:start  { stage, description }
//! stage:chunk  { markup, chars, lines, seq }     codegen only, throttled
//! stage:done   { stage, status, durationMs, summary?, error? }
//! stage:error  { stage, error }
//! result       { ...PipelineResult }
//! error        { error, details }
//! ```
//!
//! The adapter is the only place deltas are buffered. It never drops one:
//! a held-back chunk is flushed when codegen completes.

use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use sitesmith_core::{PipelineEvent, PipelineResult, PipelineStageResult, StageName, StageStatus};

pub const CHUNK_INTERVAL: Duration = Duration::from_millis(300);

/// One outbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: &'static str,
    pub data: Value,
}

impl Frame {
    fn new(event: &'static str, data: Value) -> Self {
        Self { event, data }
    }

    pub fn result(result: &PipelineResult) -> Self {
        Self::new("result", serde_json::to_value(result).unwrap_or(Value::Null))
    }

    pub fn error(error: &str, details: &str) -> Self {
        Self::new("error", json!({ "error": error, "details": details }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFrame {
    pub markup: String,
    pub chars: usize,
    pub lines: usize,
    pub seq: u64,
}

// ============================================================================
// CHUNK THROTTLE
// ============================================================================

/// Accumulates codegen deltas and releases the running markup at most once
/// per interval.
#[derive(Debug)]
pub struct ChunkThrottle {
    interval: Duration,
    accumulated: String,
    last_sent: Option<Instant>,
    pending: bool,
    seq: u64,
}

impl ChunkThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulated: String::new(),
            last_sent: None,
            pending: false,
            seq: 0,
        }
    }

    /// Appends `delta`; returns a frame if the interval has elapsed.
    pub fn push(&mut self, delta: &str, now: Instant) -> Option<ChunkFrame> {
        self.accumulated.push_str(delta);
        let due = self
            .last_sent
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            Some(self.emit(now))
        } else {
            self.pending = true;
            None
        }
    }

    /// Releases anything held back.
    pub fn flush(&mut self, now: Instant) -> Option<ChunkFrame> {
        self.pending.then(|| self.emit(now))
    }

    fn emit(&mut self, now: Instant) -> ChunkFrame {
        self.seq += 1;
        self.pending = false;
        self.last_sent = Some(now);
        ChunkFrame {
            markup: self.accumulated.clone(),
            chars: self.accumulated.chars().count(),
            lines: self.accumulated.split('\n').count(),
            seq: self.seq,
        }
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

pub struct ProtocolAdapter {
    chunks: ChunkThrottle,
}

impl Default for ProtocolAdapter {
    fn default() -> Self {
        Self::new(CHUNK_INTERVAL)
    }
}

impl ProtocolAdapter {
    pub fn new(interval: Duration) -> Self {
        Self {
            chunks: ChunkThrottle::new(interval),
        }
    }

    pub fn on_event(&mut self, event: PipelineEvent, now: Instant) -> Vec<Frame> {
        match event {
            PipelineEvent::StageStarted { stage, description } => vec![Frame::new(
                "stage:start",
                json!({ "stage": stage, "description": description }),
            )],
            PipelineEvent::Chunk { delta } => self
                .chunks
                .push(&delta, now)
                .map(chunk_frame)
                .into_iter()
                .collect(),
            PipelineEvent::StageFailed { stage, error } => vec![Frame::new(
                "stage:error",
                json!({ "stage": stage, "error": error }),
            )],
            PipelineEvent::StageCompleted(meta) => {
                let mut frames = Vec::with_capacity(2);
                if meta.stage == StageName::Codegen {
                    frames.extend(self.chunks.flush(now).map(chunk_frame));
                }
                frames.push(Frame::new("stage:done", done_payload(&meta)));
                frames
            }
        }
    }
}

fn chunk_frame(chunk: ChunkFrame) -> Frame {
    Frame::new("stage:chunk", serde_json::to_value(chunk).unwrap_or(Value::Null))
}

fn done_payload(meta: &PipelineStageResult) -> Value {
    let mut payload = json!({
        "stage": meta.stage,
        "status": meta.status,
        "durationMs": meta.duration_ms,
    });
    if meta.status == StageStatus::Success {
        if let Some(data) = &meta.data {
            payload["summary"] = summarize(meta.stage, data);
        }
    }
    if let Some(error) = &meta.error {
        payload["error"] = json!(error);
    }
    payload
}

/// Small per-stage projection so `stage:done` stays light.
fn summarize(stage: StageName, data: &Value) -> Value {
    match stage {
        StageName::Intent => json!({
            "siteType": data["siteType"],
            "mood": data["mood"],
            "businessName": data["businessName"],
            "confidence": data["confidence"],
        }),
        StageName::Design => json!({
            "primary": data["colors"]["primary"],
            "background": data["colors"]["background"],
            "displayFont": data["fonts"]["display"],
            "bodyFont": data["fonts"]["body"],
            "layoutPattern": data["layoutPattern"],
        }),
        StageName::Content => {
            let ids: Vec<Value> = data["sections"]
                .as_array()
                .map(|sections| sections.iter().map(|s| s["id"].clone()).collect())
                .unwrap_or_default();
            json!({ "sectionCount": ids.len(), "sections": ids })
        }
        StageName::Codegen => json!({ "chars": data["chars"], "lines": data["lines"] }),
        StageName::Quality => data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    fn codegen_done() -> PipelineEvent {
        PipelineEvent::StageCompleted(PipelineStageResult {
            stage: StageName::Codegen,
            status: StageStatus::Success,
            duration_ms: 900,
            data: Some(json!({ "chars": 20, "lines": 1 })),
            error: None,
        })
    }

    #[test]
    fn test_throttle_releases_at_most_once_per_interval() {
        let t0 = Instant::now();
        let mut throttle = ChunkThrottle::new(CHUNK_INTERVAL);

        let first = throttle.push("<!DOCTYPE html>", t0).unwrap();
        assert_eq!(first.seq, 1);
        assert!(throttle.push("\n<html>", ms(t0, 100)).is_none());
        assert!(throttle.push("<head>", ms(t0, 299)).is_none());

        let second = throttle.push("</head>", ms(t0, 300)).unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.markup, "<!DOCTYPE html>\n<html><head></head>");
        assert_eq!(second.lines, 2);
        assert!(throttle.flush(ms(t0, 310)).is_none());
    }

    #[test]
    fn test_flush_releases_the_remainder_once() {
        let t0 = Instant::now();
        let mut throttle = ChunkThrottle::new(CHUNK_INTERVAL);
        throttle.push("<html>", t0);
        throttle.push("<body></body>", ms(t0, 50));

        let last = throttle.flush(ms(t0, 60)).unwrap();
        assert_eq!(last.markup, "<html><body></body>");
        assert_eq!(last.chars, 19);
        assert!(throttle.flush(ms(t0, 70)).is_none());
    }

    #[test]
    fn test_codegen_completion_flushes_before_done() {
        let t0 = Instant::now();
        let mut adapter = ProtocolAdapter::default();
        adapter.on_event(PipelineEvent::Chunk { delta: "<html>".into() }, t0);
        assert!(adapter
            .on_event(PipelineEvent::Chunk { delta: "</html>".into() }, ms(t0, 10))
            .is_empty());

        let frames = adapter.on_event(codegen_done(), ms(t0, 20));
        let names: Vec<&str> = frames.iter().map(|f| f.event).collect();
        assert_eq!(names, vec!["stage:chunk", "stage:done"]);
        assert_eq!(frames[0].data["markup"], "<html></html>");
        assert_eq!(frames[0].data["seq"], 2);
        assert_eq!(frames[1].data["summary"]["chars"], 20);
    }

    #[test]
    fn test_done_summaries() {
        let mut adapter = ProtocolAdapter::default();
        let frames = adapter.on_event(
            PipelineEvent::StageCompleted(PipelineStageResult {
                stage: StageName::Design,
                status: StageStatus::Success,
                duration_ms: 4000,
                data: Some(json!({
                    "colors": { "primary": "#06b6d4", "background": "#0a1628" },
                    "fonts": { "display": "Space Grotesk", "body": "Inter" },
                    "layoutPattern": "bento_grid"
                })),
                error: None,
            }),
            Instant::now(),
        );
        let data = &frames[0].data;
        assert_eq!(data["stage"], "design");
        assert_eq!(data["status"], "success");
        assert_eq!(data["durationMs"], 4000);
        assert_eq!(data["summary"]["primary"], "#06b6d4");
        assert_eq!(data["summary"]["displayFont"], "Space Grotesk");
    }

    #[test]
    fn test_failed_stage_frames() {
        let mut adapter = ProtocolAdapter::default();
        let error = "SCHEMA/Design system missing required color fields".to_string();
        let failed = adapter.on_event(
            PipelineEvent::StageFailed {
                stage: StageName::Design,
                error: error.clone(),
            },
            Instant::now(),
        );
        assert_eq!(failed[0].event, "stage:error");
        assert_eq!(failed[0].data["error"], error.as_str());

        let done = adapter.on_event(
            PipelineEvent::StageCompleted(PipelineStageResult {
                stage: StageName::Design,
                status: StageStatus::Error,
                duration_ms: 12,
                data: None,
                error: Some(error.clone()),
            }),
            Instant::now(),
        );
        assert_eq!(done[0].data["status"], "error");
        assert_eq!(done[0].data["error"], error.as_str());
        assert!(done[0].data.get("summary").is_none());
    }

    #[test]
    fn test_skipped_stage_has_no_summary() {
        let mut adapter = ProtocolAdapter::default();
        let frames = adapter.on_event(
            PipelineEvent::StageCompleted(PipelineStageResult::skipped(StageName::Content)),
            Instant::now(),
        );
        assert_eq!(frames[0].data["status"], "skipped");
        assert_eq!(frames[0].data["durationMs"], 0);
    }
}
