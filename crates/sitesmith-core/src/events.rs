//! Pipeline events flowing from the orchestrator to whoever observes a run.
use tokio::sync::mpsc;

use crate::data_model::PipelineStageResult;
use crate::stage::StageName;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted { stage: StageName, description: String },
    /// One raw text delta from document generation, in provider order.
    Chunk { delta: String },
    StageCompleted(PipelineStageResult),
    StageFailed { stage: StageName, error: String },
}

/// Write half of the event channel. A disabled sink drops everything.
///
/// The channel is unbounded so deltas can be pushed from the synchronous
/// chunk callback without ever being dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// True when someone is listening for live progress.
    pub fn is_live(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            // A closed receiver means the observer left; the run carries on.
            let _ = tx.send(event);
        }
    }
}

pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<PipelineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx: Some(tx) }, rx)
}
