//! Run Context: per-run state handed to every stage
use crate::cancel::CancellationToken;
use crate::data_model::Tier;
use crate::events::EventSink;

#[derive(Debug, Clone)]
pub struct RunContext {
    pub trace_id: String,
    pub tier: Tier,
    pub model: String,
    pub cancel: CancellationToken,
    pub events: EventSink,
}

impl RunContext {
    pub fn new(tier: Tier, model: impl Into<String>) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            tier,
            model: model.into(),
            cancel: CancellationToken::new(),
            events: EventSink::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
