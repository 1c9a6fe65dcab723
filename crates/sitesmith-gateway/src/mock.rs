//! Scripted gateway for exercising stages and the orchestrator offline
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::client::{CallOptions, LlmGateway, Message};
use sitesmith_core::{Result, SmithError};

/// One call as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub purpose: Option<&'static str>,
    pub streaming: bool,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub model: Option<String>,
}

/// Replies are queued per call purpose so concurrent stages stay
/// deterministic. The last reply for a purpose is reused once its queue
/// drains; an unscripted purpose fails with a provider error.
pub struct MockGateway {
    scripts: Mutex<HashMap<&'static str, VecDeque<Result<String>>>>,
    calls: Mutex<Vec<RecordedCall>>,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            chunk_size: 64,
            chunk_delay: None,
        }
    }

    pub fn respond(self, purpose: &'static str, text: impl Into<String>) -> Self {
        self.push(purpose, Ok(text.into()));
        self
    }

    pub fn fail(self, purpose: &'static str, err: SmithError) -> Self {
        self.push(purpose, Err(err));
        self
    }

    /// Size of each streamed delta, in characters.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Pause between streamed deltas.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    fn push(&self, purpose: &'static str, reply: Result<String>) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(purpose)
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn calls_for(&self, purpose: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.purpose == Some(purpose))
            .count()
    }

    fn record(&self, messages: &[Message], options: &CallOptions, streaming: bool) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                purpose: options.purpose,
                streaming,
                messages: messages.to_vec(),
                max_tokens: options.max_tokens,
                temperature: options.temperature,
                model: options.model.clone(),
            });
    }

    fn next_reply(&self, options: &CallOptions) -> Result<String> {
        let purpose = options.purpose.unwrap_or("call");
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        let reply = match scripts.get_mut(purpose) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        reply.unwrap_or_else(|| unscripted(purpose))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn unscripted(purpose: &str) -> Result<String> {
    Err(SmithError::Provider {
        status: 500,
        body: format!("no scripted reply for {purpose}"),
    })
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn call(&self, messages: &[Message], options: &CallOptions) -> Result<String> {
        self.record(messages, options, false);
        self.next_reply(options)
    }

    async fn call_streaming(
        &self,
        messages: &[Message],
        options: &CallOptions,
        on_chunk: &mut (dyn for<'a, 'b> FnMut(&'a str, &'b str) + Send),
    ) -> Result<String> {
        self.record(messages, options, true);
        let text = self.next_reply(options)?;

        let chars: Vec<char> = text.chars().collect();
        let mut accumulated = String::with_capacity(text.len());
        for piece in chars.chunks(self.chunk_size) {
            if let Some(token) = &options.cancel {
                if token.is_cancelled() {
                    return Err(SmithError::Cancelled);
                }
            }
            let delta: String = piece.iter().collect();
            accumulated.push_str(&delta);
            on_chunk(&delta, &accumulated);
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(accumulated)
    }
}
