//! API Handlers
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::metrics::Metrics;
use crate::stream::{Frame, ProtocolAdapter};
use crate::AppState;
use sitesmith_core::{
    event_channel, CancellationToken, DropGuard, PipelineEvent, PipelineInput, PipelineResult,
    StyleSystem, Tier,
};
use sitesmith_gateway::{Message, Role, SUPPORTED_MODELS};
use sitesmith_stages::IterateOutput;

pub type ApiError = (StatusCode, Json<Value>);

const PROMPT_REQUIRED: &str = "prompt is required and must be a non-empty string";

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Falls back to `default` for anything not on the supported list.
fn supported_model(requested: Option<&str>, default: &str) -> String {
    requested
        .filter(|m| SUPPORTED_MODELS.contains(m))
        .unwrap_or(default)
        .to_string()
}

// ============================================================================
// GENERATION
// ============================================================================

/// `tier` wins over its older `quality` alias.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateRequest {
    pub prompt: Option<Value>,
    pub tier: Option<String>,
    pub quality: Option<String>,
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn into_input(self, default_model: &str) -> Result<PipelineInput, ApiError> {
        let prompt = self
            .prompt
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| bad_request(PROMPT_REQUIRED))?
            .to_string();
        let tier = self.tier.filter(|t| !t.trim().is_empty()).or(self.quality);

        Ok(PipelineInput {
            prompt,
            tier: Tier::parse_or_default(tier.as_deref()),
            model: Some(supported_model(self.model.as_deref(), default_model)),
        })
    }
}

pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<PipelineResult>, ApiError> {
    let input = request.into_input(&state.default_model)?;
    tracing::info!(tier = %input.tier, prompt_chars = input.prompt.len(), "generation requested");

    let result = state.pipeline.run(input).await;
    state.metrics.record_run(&result);
    tracing::info!(
        tier = %result.tier,
        duration_ms = result.total_duration_ms,
        html_chars = result.html.len(),
        score = result.quality_report.score,
        "generation finished"
    );
    Ok(Json(result))
}

pub async fn generate_stream(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let input = request.into_input(&state.default_model)?;
    tracing::info!(tier = %input.tier, prompt_chars = input.prompt.len(), "streaming generation requested");

    let (sink, events) = event_channel();
    let cancel = CancellationToken::new();
    // Dropping the response stream (client gone) cancels the run.
    let guard = cancel.clone().drop_guard();
    let pipeline = state.pipeline.clone();
    let run = tokio::spawn(async move { pipeline.run_observed(input, sink, cancel).await });

    let frames = FrameStream {
        events,
        adapter: ProtocolAdapter::default(),
        run: Some(run),
        pending: VecDeque::new(),
        guard: Some(guard),
        metrics: state.metrics.clone(),
        done: false,
    };
    Ok(Sse::new(frames.into_stream()).keep_alive(KeepAlive::default()))
}

/// Drains pipeline events through the adapter, then emits the final result.
struct FrameStream {
    events: UnboundedReceiver<PipelineEvent>,
    adapter: ProtocolAdapter,
    run: Option<JoinHandle<PipelineResult>>,
    pending: VecDeque<Frame>,
    guard: Option<DropGuard>,
    metrics: Arc<Metrics>,
    done: bool,
}

impl FrameStream {
    async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            if self.done {
                return None;
            }
            match self.events.recv().await {
                Some(event) => {
                    let frames = self.adapter.on_event(event, Instant::now());
                    self.pending.extend(frames);
                }
                None => self.finish().await,
            }
        }
    }

    /// The channel closes once the run has returned.
    async fn finish(&mut self) {
        self.done = true;
        if let Some(guard) = self.guard.take() {
            guard.disarm();
        }
        let Some(run) = self.run.take() else {
            return;
        };
        match run.await {
            Ok(result) => {
                self.metrics.record_run(&result);
                self.pending.push_back(Frame::result(&result));
            }
            Err(err) => {
                tracing::error!(error = %err, "pipeline task ended abnormally");
                self.pending
                    .push_back(Frame::error("Pipeline failed", &err.to_string()));
            }
        }
    }

    fn into_stream(self) -> impl Stream<Item = Result<Event, Infallible>> {
        stream::unfold(self, |mut frames| async move {
            let frame = frames.next_frame().await?;
            Some((Ok(to_event(frame)), frames))
        })
    }
}

fn to_event(frame: Frame) -> Event {
    Event::default().event(frame.event).data(frame.data.to_string())
}

// ============================================================================
// ITERATION
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IterateRequest {
    pub messages: Vec<Message>,
    /// Style to keep; when absent the mood's template is used.
    pub style_system: Option<StyleSystem>,
    pub mood: Option<String>,
    pub model: Option<String>,
}

pub async fn iterate(
    State(state): State<AppState>,
    Json(request): Json<IterateRequest>,
) -> Result<Json<IterateOutput>, ApiError> {
    let history: Vec<Message> = request
        .messages
        .into_iter()
        .filter(|m| m.role != Role::System)
        .collect();
    if !history.iter().any(|m| m.role == Role::User) {
        return Err(bad_request("messages must include at least one user message"));
    }

    let style = match request.style_system {
        Some(style) => style,
        None => state
            .pipeline
            .styles()
            .get(request.mood.as_deref().unwrap_or_default())
            .clone(),
    };
    let model = supported_model(request.model.as_deref(), &state.default_model);

    match state.pipeline.iterate(&history, &style, Some(model)).await {
        Ok(output) => Ok(Json(output)),
        Err(err) => {
            tracing::warn!(error = %err, "iteration failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Iteration failed", "details": err.to_string() })),
            ))
        }
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })),
    )
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}
