//! Provider client and the gateway trait the stages depend on
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::extract::parse_structured;
use crate::sse::{Delta, SseDecoder, StreamEvent, Usage};
use sitesmith_core::{CancellationToken, Result, SmithError};

// ============================================================================
// MESSAGES & OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Per-call knobs. Unset values fall back to the gateway config.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Short label for logs ("intent", "codegen", ...).
    pub purpose: Option<&'static str>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new(purpose: &'static str) -> Self {
        Self { purpose: Some(purpose), ..Self::default() }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn label(&self) -> &'static str {
        self.purpose.unwrap_or("call")
    }
}

// ============================================================================
// GATEWAY TRAIT
// ============================================================================

/// The contract the pipeline needs from a text provider.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Buffered call returning the full response text.
    async fn call(&self, messages: &[Message], options: &CallOptions) -> Result<String>;

    /// Incremental call. `on_chunk(delta, accumulated)` runs once per text
    /// delta, in order; the full text is returned when the stream closes.
    async fn call_streaming(
        &self,
        messages: &[Message],
        options: &CallOptions,
        on_chunk: &mut (dyn for<'a, 'b> FnMut(&'a str, &'b str) + Send),
    ) -> Result<String>;
}

/// `call` followed by the tolerant structured-data extractor.
pub async fn call_structured<T: DeserializeOwned>(
    gateway: &dyn LlmGateway,
    messages: &[Message],
    options: &CallOptions,
) -> Result<T> {
    let text = gateway.call(messages, options).await?;
    parse_structured(&text)
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    cache_control: CacheControl,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}

/// Maps a non-2xx status to the error taxonomy.
pub(crate) fn classify_status(status: u16, body: String) -> SmithError {
    match status {
        429 => SmithError::RateLimited(body),
        529 => SmithError::Overloaded(body),
        s if s >= 500 && body.to_ascii_lowercase().contains("overloaded") => {
            SmithError::Overloaded(body)
        }
        s => SmithError::Provider { status: s, body },
    }
}

// ============================================================================
// ANTHROPIC GATEWAY
// ============================================================================

/// Messages-API client. Construct once and share by reference.
pub struct AnthropicGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl AnthropicGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SmithError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn request_body<'a>(
        &self,
        model: &'a str,
        messages: &'a [Message],
        options: &CallOptions,
        stream: bool,
    ) -> MessagesRequest<'a> {
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let system = if system_text.is_empty() {
            Vec::new()
        } else {
            vec![SystemBlock {
                kind: "text",
                text: system_text.join("\n\n"),
                cache_control: CacheControl { kind: "ephemeral" },
            }]
        };

        MessagesRequest {
            model,
            max_tokens: options.max_tokens.unwrap_or(self.config.default_max_tokens),
            temperature: options.temperature.unwrap_or(self.config.default_temperature),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| WireMessage { role: m.role, content: &m.content })
                .collect(),
            system,
            stream,
        }
    }

    fn post(&self, body: &MessagesRequest<'_>) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(body);
        if let Some(beta) = &self.config.beta {
            request = request.header("anthropic-beta", beta);
        }
        request
    }

    fn transport_error(err: reqwest::Error, limit: Duration) -> SmithError {
        if err.is_timeout() {
            SmithError::Timeout(limit.as_secs())
        } else if err.is_connect() {
            SmithError::Http(format!("cannot reach provider: {err}"))
        } else {
            SmithError::Http(err.to_string())
        }
    }

    /// Sends once and returns the response if the status is 2xx.
    async fn open(&self, body: &MessagesRequest<'_>, limit: Duration) -> Result<reqwest::Response> {
        let response = self
            .post(body)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, limit))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), text))
    }

    /// One buffered attempt, bounded by the buffered timeout.
    async fn attempt_buffered(&self, body: &MessagesRequest<'_>) -> Result<MessagesResponse> {
        let limit = self.config.buffered_timeout;
        let attempt = async {
            let response = self.open(body, limit).await?;
            response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| SmithError::Http(format!("unreadable provider response: {e}")))
        };
        tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| SmithError::Timeout(limit.as_secs()))?
    }

    fn apply_event(
        payload: &str,
        accumulated: &mut String,
        usage: &mut Usage,
        on_chunk: &mut (dyn for<'a, 'b> FnMut(&'a str, &'b str) + Send),
    ) -> Result<()> {
        let event: StreamEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(error = %err, "skipping malformed stream event");
                return Ok(());
            }
        };
        match event {
            StreamEvent::ContentBlockDelta { delta: Delta::TextDelta { text } } => {
                accumulated.push_str(&text);
                on_chunk(&text, accumulated.as_str());
            }
            StreamEvent::MessageStart { message } => {
                if let Some(reported) = message.usage {
                    usage.merge(&reported);
                }
            }
            StreamEvent::MessageDelta { usage: Some(reported) } => usage.merge(&reported),
            StreamEvent::Error { error } => {
                return Err(SmithError::Stream(format!("provider stream error: {error}")));
            }
            _ => {}
        }
        Ok(())
    }

    async fn consume_stream(
        &self,
        body: &MessagesRequest<'_>,
        label: &'static str,
        on_chunk: &mut (dyn for<'a, 'b> FnMut(&'a str, &'b str) + Send),
    ) -> Result<String> {
        let limit = self.config.streaming_timeout;
        // Retries only cover opening the stream; once deltas flow, failures surface.
        let response = self.config.retry.run(label, || self.open(body, limit)).await?;

        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut accumulated = String::new();
        let mut usage = Usage::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| SmithError::Stream(e.to_string()))?;
            for payload in decoder.push(&chunk) {
                Self::apply_event(&payload, &mut accumulated, &mut usage, on_chunk)?;
            }
        }
        for payload in decoder.finish() {
            Self::apply_event(&payload, &mut accumulated, &mut usage, on_chunk)?;
        }

        log_usage(label, body.model, &usage);
        Ok(accumulated)
    }
}

fn log_usage(label: &str, model: &str, usage: &Usage) {
    tracing::info!(
        call = label,
        model,
        input_tokens = usage.input_tokens,
        cache_read_tokens = usage.cache_read_input_tokens,
        cache_creation_tokens = usage.cache_creation_input_tokens,
        output_tokens = usage.output_tokens,
        "provider usage"
    );
}

/// Races `work` against the run's cancellation token.
async fn with_cancel<T>(
    cancel: Option<&CancellationToken>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match cancel {
        Some(token) => {
            if token.is_cancelled() {
                return Err(SmithError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(SmithError::Cancelled),
                result = work => result,
            }
        }
        None => work.await,
    }
}

#[async_trait]
impl LlmGateway for AnthropicGateway {
    async fn call(&self, messages: &[Message], options: &CallOptions) -> Result<String> {
        let model = self.config.resolve_model(options.model.as_deref());
        let body = self.request_body(&model, messages, options, false);
        let label = options.label();
        tracing::debug!(call = label, model = %model, max_tokens = body.max_tokens, "provider call");

        let work = self.config.retry.run(label, || self.attempt_buffered(&body));
        let response = with_cancel(options.cancel.as_ref(), work).await?;

        if let Some(usage) = &response.usage {
            log_usage(label, &model, usage);
        }
        Ok(response.text())
    }

    async fn call_streaming(
        &self,
        messages: &[Message],
        options: &CallOptions,
        on_chunk: &mut (dyn for<'a, 'b> FnMut(&'a str, &'b str) + Send),
    ) -> Result<String> {
        let model = self.config.resolve_model(options.model.as_deref());
        let body = self.request_body(&model, messages, options, true);
        let label = options.label();
        let limit = self.config.streaming_timeout;
        tracing::debug!(call = label, model = %model, max_tokens = body.max_tokens, "provider stream");

        let work = async {
            tokio::time::timeout(limit, self.consume_stream(&body, label, on_chunk))
                .await
                .map_err(|_| SmithError::Timeout(limit.as_secs()))?
        };
        with_cancel(options.cancel.as_ref(), work).await
    }
}
