//! Progress events emitted while a run advances.

use std::fmt;
use std::sync::Mutex;

use tokio::sync::mpsc;

/// States of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    Start,
    Ingredients,
    Meals,
    Grocery,
    Prep,
    Done,
    Failed,
}

impl RunStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Ingredients => "ingredients",
            Self::Meals => "meals",
            Self::Grocery => "grocery",
            Self::Prep => "prep",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Started,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: RunStage,
    pub phase: Phase,
    pub message: String,
}

impl ProgressEvent {
    pub fn started(stage: RunStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            phase: Phase::Started,
            message: message.into(),
        }
    }

    pub fn completed(stage: RunStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            phase: Phase::Completed,
            message: message.into(),
        }
    }
}

/// Receiver of progress events. `emit` must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events to a channel; a closed receiver is ignored.
impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn stages(&self) -> Vec<(RunStage, Phase)> {
        self.events().iter().map(|e| (e.stage, e.phase)).collect()
    }
}

impl ProgressSink for ProgressLog {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_forwards_and_tolerates_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(ProgressEvent::started(RunStage::Meals, "writing meals"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.stage, RunStage::Meals);
        assert_eq!(event.phase, Phase::Started);

        drop(rx);
        tx.emit(ProgressEvent::completed(RunStage::Done, "done"));
    }

    #[test]
    fn log_records_in_order() {
        let log = ProgressLog::new();
        log.emit(ProgressEvent::started(RunStage::Start, "a"));
        log.emit(ProgressEvent::completed(RunStage::Done, "b"));
        assert_eq!(
            log.stages(),
            vec![(RunStage::Start, Phase::Started), (RunStage::Done, Phase::Completed)]
        );
        assert!(RunStage::Done.is_terminal());
        assert!(!RunStage::Prep.is_terminal());
    }
}
