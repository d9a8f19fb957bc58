//! Progress reporting for generation runs.
//!
//! The pipeline reports progress through a [`ProgressSink`] invoked
//! synchronously before each stage. Sinks are advisory and must never block
//! or abort a generation: a panicking sink is caught, logged to stderr, and
//! ignored.
//!
//! [`EventLogSink`] adapts the sink contract to an append-only NDJSON event
//! log (one JSON object per line, RFC3339 timestamps), which is what the CLI
//! uses so generation runs leave an auditable trail.

use crate::pipeline::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// One progress notification: the stage about to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Stage the pipeline is about to enter.
    pub stage: Stage,
    /// Human-readable detail (template id, target path, counts).
    pub message: String,
}

/// Observer of pipeline progress.
///
/// Implementations must not rely on being called for every stage (a failed
/// generation stops early) and must tolerate being called from a worker
/// thread. The pipeline catches panics from `notify`; a sink can not abort
/// a generation.
pub trait ProgressSink: Send + Sync {
    /// Called synchronously before each stage starts.
    fn notify(&self, event: &ProgressEvent);
}

/// Sink that discards all events.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn notify(&self, _event: &ProgressEvent) {}
}

/// Sink that stores events in memory; used by the host to expose a task's
/// progress history, and by tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl ProgressSink for CollectingSink {
    fn notify(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(event.clone());
    }
}

/// Serialized form of an event-log line.
#[derive(Debug, Serialize)]
struct LogLine<'a> {
    ts: DateTime<Utc>,
    stage: String,
    detail: &'a str,
}

/// Append-only NDJSON event log.
///
/// Each notification appends one JSON object per line. Write failures are
/// swallowed after a stderr note: the log is an audit aid, not a correctness
/// dependency.
#[derive(Debug)]
pub struct EventLogSink {
    path: PathBuf,
}

impl EventLogSink {
    /// Create a sink appending to `path`. The file is created on first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, event: &ProgressEvent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        let line = LogLine {
            ts: Utc::now(),
            stage: event.stage.to_string(),
            detail: &event.message,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }
}

impl ProgressSink for EventLogSink {
    fn notify(&self, event: &ProgressEvent) {
        if let Err(e) = self.append(event) {
            eprintln!(
                "warning: failed to append event log '{}': {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Fan a notification out to several sinks.
pub struct FanOutSink {
    sinks: Vec<std::sync::Arc<dyn ProgressSink>>,
}

impl FanOutSink {
    /// Create a fan-out over the given sinks.
    pub fn new(sinks: Vec<std::sync::Arc<dyn ProgressSink>>) -> Self {
        Self { sinks }
    }
}

impl ProgressSink for FanOutSink {
    fn notify(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            safe_notify(sink.as_ref(), event);
        }
    }
}

/// Invoke a sink under the no-panic contract: a panic inside `notify` is
/// caught and logged, never propagated into the pipeline.
pub fn safe_notify(sink: &dyn ProgressSink, event: &ProgressEvent) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        sink.notify(event);
    }));
    if result.is_err() {
        eprintln!(
            "warning: progress sink panicked during stage '{}'; ignoring",
            event.stage
        );
    }
}
