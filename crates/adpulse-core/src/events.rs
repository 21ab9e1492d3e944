//! Pipeline event log
//!
//! Every stage reports what it is doing through an injected [`EventSink`].
//! Events carry the emitting stage, an event name, a severity level and a
//! free-form JSON object of context. Sinks:
//!
//! - [`JsonlEventLog`] appends one JSON object per line to a trace file
//! - [`MemoryEventLog`] keeps events in memory (tests, embedding)
//!
//! Both mirror each event to `tracing` at the matching level, so the trace
//! file and the console tell the same story.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::Result;

/// Severity of a pipeline event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
    /// Unrecoverable after all retries
    Critical,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warning => "warning",
            EventLevel::Error => "error",
            EventLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// UTC timestamp, RFC 3339
    pub timestamp: String,
    /// Stage that emitted the event
    pub agent: String,
    pub event: String,
    pub status: EventLevel,
    pub extra: Value,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(agent: &str, event: &str, status: EventLevel, extra: Value) -> Self {
        let extra = match extra {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self {
            timestamp: Utc::now().to_rfc3339(),
            agent: agent.to_string(),
            event: event.to_string(),
            status,
            extra,
        }
    }
}

/// Destination for pipeline events
///
/// Emitting never fails from the caller's point of view: a sink that cannot
/// record an event reports the problem through `tracing` and carries on.
pub trait EventSink: Send + Sync {
    /// Record an event for `stage`
    fn emit(&self, stage: &str, event: &str, level: EventLevel, extra: Value);
}

fn mirror_to_tracing(event: &Event) {
    match event.status {
        EventLevel::Info => {
            tracing::debug!(agent = %event.agent, extra = %event.extra, "{}", event.event)
        }
        EventLevel::Warning => {
            tracing::warn!(agent = %event.agent, extra = %event.extra, "{}", event.event)
        }
        EventLevel::Error | EventLevel::Critical => {
            tracing::error!(
                agent = %event.agent,
                status = %event.status,
                extra = %event.extra,
                "{}",
                event.event
            )
        }
    }
}

/// Append-only JSON-lines event log
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    /// Create a log writing to `path`
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::debug!("Created log directory: {}", parent.display());
            }
        }
        Ok(Self { path })
    }

    /// Path of the trace file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &Event) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl EventSink for JsonlEventLog {
    fn emit(&self, stage: &str, event: &str, level: EventLevel, extra: Value) {
        let event = Event::new(stage, event, level, extra);
        mirror_to_tracing(&event);
        if let Err(e) = self.append(&event) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to append to event log"
            );
        }
    }
}

/// In-memory event log
#[derive(Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events with the given name, in emission order
    pub fn find(&self, name: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.event == name)
            .collect()
    }

    /// Whether an event with the given name was recorded
    pub fn contains(&self, name: &str) -> bool {
        !self.find(name).is_empty()
    }
}

impl EventSink for MemoryEventLog {
    fn emit(&self, stage: &str, event: &str, level: EventLevel, extra: Value) {
        let event = Event::new(stage, event, level, extra);
        mirror_to_tracing(&event);
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Brackets a stage action with `start_<action>` / `end_<action>` events
pub struct StageTimer<'a> {
    sink: &'a dyn EventSink,
    stage: &'a str,
    action: &'a str,
    started: Instant,
}

impl<'a> StageTimer<'a> {
    /// Emit `start_<action>` and begin timing
    pub fn start(sink: &'a dyn EventSink, stage: &'a str, action: &'a str) -> Self {
        sink.emit(stage, &format!("start_{}", action), EventLevel::Info, json!({}));
        Self {
            sink,
            stage,
            action,
            started: Instant::now(),
        }
    }

    /// Emit `end_<action>` with `duration_sec` plus any summary counters
    ///
    /// `summary` keys are merged into the event's extra object; a non-object
    /// summary is stored under `summary`.
    pub fn finish(self, summary: Value) -> Duration {
        let elapsed = self.started.elapsed();

        let mut extra = Map::new();
        extra.insert("duration_sec".to_string(), json!(elapsed.as_secs_f64()));
        match summary {
            Value::Object(fields) => extra.extend(fields),
            Value::Null => {}
            other => {
                extra.insert("summary".to_string(), other);
            }
        }

        self.sink.emit(
            self.stage,
            &format!("end_{}", self.action),
            EventLevel::Info,
            Value::Object(extra),
        );
        elapsed
    }

    /// Emit `<action>_failed` at error level and return the elapsed time
    pub fn fail(self, error: &dyn std::fmt::Display) -> Duration {
        let elapsed = self.started.elapsed();
        self.sink.emit(
            self.stage,
            &format!("{}_failed", self.action),
            EventLevel::Error,
            json!({
                "duration_sec": elapsed.as_secs_f64(),
                "error": error.to_string(),
            }),
        );
        elapsed
    }
}
