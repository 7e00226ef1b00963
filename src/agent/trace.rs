//! Session tracing.
//!
//! The orchestrator reports checkpoints to an injected [`TraceSink`].
//! Sinks never fail the session: write errors are logged and dropped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{EvaluationResult, ResearchCategory, ScoreSummary};
use crate::error::Stage;

/// A pipeline checkpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// The query was classified.
    Routed {
        /// Chosen category.
        category: ResearchCategory,
        /// Whether the fallback category was used.
        fell_back: bool,
    },
    /// The search plan was accepted.
    Planned {
        /// Number of tasks.
        tasks: usize,
        /// Planning attempts used.
        attempts: usize,
    },
    /// The search round finished.
    Searched {
        /// Dispatched calls.
        dispatched: usize,
        /// Successful calls.
        succeeded: usize,
        /// Failed calls.
        failed: usize,
    },
    /// The initial draft was written.
    Synthesized {
        /// Draft version.
        version: usize,
        /// Attempts used, including the corrective retry.
        attempts: usize,
    },
    /// A draft was scored.
    Evaluated {
        /// Iteration number (1-based).
        iteration: usize,
        /// Draft version.
        version: usize,
        /// Per-evaluator results.
        evaluations: Vec<EvaluationResult>,
        /// Aggregate score.
        summary: ScoreSummary,
        /// Whether every evaluator passed.
        passed: bool,
    },
    /// A revised draft was written.
    Revised {
        /// Version revised from.
        from: usize,
        /// New version.
        to: usize,
    },
    /// The session ended.
    Finished {
        /// Final status label.
        status: String,
        /// Whether the final draft met the threshold.
        met_quality_threshold: bool,
        /// Drafts produced.
        iterations: usize,
        /// Total tokens used.
        total_tokens: u32,
    },
    /// The session stopped on an interrupt.
    Cancelled {
        /// Stage that was about to run or was running.
        stage: Stage,
        /// Whether a draft was kept.
        has_draft: bool,
    },
    /// The session ended with an error.
    Failed {
        /// Failing stage, if stage-specific.
        stage: Option<Stage>,
        /// Error message.
        error: String,
    },
}

impl TraceEvent {
    /// Short event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Routed { .. } => "routed",
            Self::Planned { .. } => "planned",
            Self::Searched { .. } => "searched",
            Self::Synthesized { .. } => "synthesized",
            Self::Evaluated { .. } => "evaluated",
            Self::Revised { .. } => "revised",
            Self::Finished { .. } => "finished",
            Self::Cancelled { .. } => "cancelled",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Receives pipeline checkpoints.
pub trait TraceSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &TraceEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn record(&self, _event: &TraceEvent) {}
}

/// Emits events as `tracing` debug records.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&self, event: &TraceEvent) {
        match serde_json::to_string(event) {
            Ok(json) => debug!(target: "research_rs::trace", event = event.name(), %json, "trace"),
            Err(e) => warn!(event = event.name(), error = %e, "trace event not serializable"),
        }
    }
}

#[derive(Serialize)]
struct Line<'a> {
    ts: f64,
    #[serde(flatten)]
    event: &'a TraceEvent,
}

/// Appends one JSON object per event to a file.
#[derive(Debug)]
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Creates (or truncates) the trace file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line(&self, event: &TraceEvent) -> std::io::Result<()> {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        let json = serde_json::to_string(&Line { ts, event })?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("trace writer poisoned"))?;
        writeln!(writer, "{json}")?;
        writer.flush()
    }
}

impl TraceSink for JsonlSink {
    fn record(&self, event: &TraceEvent) {
        if let Err(e) = self.write_line(event) {
            warn!(event = event.name(), error = %e, "failed to write trace event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonl_sink_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("trace.jsonl");
        let sink = JsonlSink::create(&path).unwrap_or_else(|_| unreachable!());

        sink.record(&TraceEvent::Routed {
            category: ResearchCategory::Technical,
            fell_back: false,
        });
        sink.record(&TraceEvent::Revised { from: 0, to: 1 });

        let content = std::fs::read_to_string(&path).unwrap_or_default();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "routed");
        assert_eq!(lines[0]["category"], "technical");
        assert!(lines[0]["ts"].as_f64().is_some());
        assert_eq!(lines[1]["event"], "revised");
        assert_eq!(lines[1]["to"], 1);
    }

    #[test]
    fn test_event_names() {
        let event = TraceEvent::Planned {
            tasks: 3,
            attempts: 1,
        };
        assert_eq!(event.name(), "planned");
        NoopSink.record(&event);
        LogSink.record(&event);
    }

    #[test]
    fn test_terminal_events_serialize_stage() {
        let failed = TraceEvent::Failed {
            stage: Some(Stage::Searching),
            error: "insufficient evidence".into(),
        };
        let value = serde_json::to_value(&failed).unwrap_or_default();
        assert_eq!(value["event"], "failed");
        assert_eq!(value["stage"], "searching");

        let cancelled = TraceEvent::Cancelled {
            stage: Stage::Evaluation,
            has_draft: true,
        };
        assert_eq!(cancelled.name(), "cancelled");
        let value = serde_json::to_value(&cancelled).unwrap_or_default();
        assert_eq!(value["stage"], "evaluation");
        assert_eq!(value["has_draft"], true);
    }
}
