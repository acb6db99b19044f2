//! Structured diagnostic events emitted while an export runs.
//!
//! Sinks are injected into the exporter; the default [`LogSink`] forwards to
//! the `log` facade and [`RecordingSink`] keeps events in memory for tests.

use std::sync::Mutex;
use std::time::Duration;

/// Pipeline stage an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preload,
    ImageWait,
    Discovery,
    Rasterize,
    Fallback,
    Assemble,
    Finalize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Started,
    Completed,
    /// A recoverable problem was absorbed and the run continues
    Tolerated(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineEvent {
    pub stage: Stage,
    pub page_index: Option<usize>,
    /// Time spent in the stage when the event was emitted
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl PipelineEvent {
    pub fn new(stage: Stage, page_index: Option<usize>, elapsed: Duration, outcome: Outcome) -> Self {
        Self {
            stage,
            page_index,
            elapsed,
            outcome,
        }
    }
}

/// Receiver of pipeline events
pub trait EventSink: Send + Sync {
    fn record(&self, event: &PipelineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn record(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: &PipelineEvent) {
        let page = event
            .page_index
            .map(|i| format!(" page={}", i))
            .unwrap_or_default();
        match &event.outcome {
            Outcome::Started => log::debug!("{:?}{} started", event.stage, page),
            Outcome::Completed => {
                log::info!("{:?}{} completed in {:?}", event.stage, page, event.elapsed)
            }
            Outcome::Tolerated(why) => log::warn!("{:?}{} tolerated: {}", event.stage, page, why),
            Outcome::Failed(why) => log::error!("{:?}{} failed: {}", event.stage, page, why),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn of_stage(&self, stage: Stage) -> Vec<PipelineEvent> {
        self.events().into_iter().filter(|e| e.stage == stage).collect()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &PipelineEvent) {
        let mut events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        events.push(event.clone());
    }
}
