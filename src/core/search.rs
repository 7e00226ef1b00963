//! Search tasks and their results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle of a search task within one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Planned, not yet dispatched.
    Pending,
    /// Dispatched to one or more search agents.
    Running,
    /// At least one dispatch produced a summary.
    Completed,
    /// Every dispatch failed or timed out.
    Failed,
}

impl TaskStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One planned search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTask {
    /// Position in the plan (0-based).
    pub id: usize,
    /// Search term.
    pub query: String,
    /// Why this search helps answer the research query.
    pub rationale: String,
    /// Current status.
    pub status: TaskStatus,
}

impl SearchTask {
    /// Creates a pending task.
    #[must_use]
    pub fn new(id: usize, query: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            rationale: rationale.into(),
            status: TaskStatus::Pending,
        }
    }

    /// Moves the task to `next`, returning `false` for an invalid transition.
    ///
    /// Valid transitions: `Pending → Running`, `Running → Completed`,
    /// `Running → Failed`.
    pub fn transition(&mut self, next: TaskStatus) -> bool {
        let valid = matches!(
            (self.status, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed | TaskStatus::Failed)
        );
        if valid {
            self.status = next;
        }
        valid
    }
}

/// Which capability produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrigin {
    /// Web search agent.
    Web,
    /// Local file search agent.
    File,
}

impl SearchOrigin {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::File => "file",
        }
    }
}

/// Outcome of one search dispatch. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// ID of the task this dispatch belongs to.
    pub task_id: usize,
    /// Search term used.
    pub query: String,
    /// Summary text; empty on failure.
    pub summary: String,
    /// Capability used.
    pub origin: SearchOrigin,
    /// Whether a usable summary was produced.
    pub success: bool,
    /// Failure description, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time of the dispatch.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl SearchResult {
    /// Successful result.
    #[must_use]
    pub fn completed(
        task: &SearchTask,
        origin: SearchOrigin,
        summary: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            task_id: task.id,
            query: task.query.clone(),
            summary,
            origin,
            success: true,
            error: None,
            elapsed,
        }
    }

    /// Failed result with an empty summary.
    #[must_use]
    pub fn failed(
        task: &SearchTask,
        origin: SearchOrigin,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            task_id: task.id,
            query: task.query.clone(),
            summary: String::new(),
            origin,
            success: false,
            error: Some(error.into()),
            elapsed,
        }
    }
}

/// Tasks and results of one search round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRound {
    /// Tasks with their terminal statuses.
    pub tasks: Vec<SearchTask>,
    /// Results in completion order.
    pub results: Vec<SearchResult>,
}

impl SearchRound {
    /// Successful results, in completion order.
    pub fn successful(&self) -> impl Iterator<Item = &SearchResult> {
        self.results.iter().filter(|r| r.success)
    }

    /// Number of successful dispatches.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.successful().count()
    }

    /// Number of failed dispatches.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_transitions() {
        let mut task = SearchTask::new(0, "qubits", "basics");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(!task.transition(TaskStatus::Completed));
        assert!(task.transition(TaskStatus::Running));
        assert!(task.transition(TaskStatus::Failed));
        assert!(task.status.is_terminal());
        assert!(!task.transition(TaskStatus::Running));
    }

    #[test]
    fn test_round_counts() {
        let task = SearchTask::new(0, "q", "r");
        let round = SearchRound {
            tasks: vec![task.clone()],
            results: vec![
                SearchResult::completed(&task, SearchOrigin::Web, "s".into(), Duration::ZERO),
                SearchResult::failed(&task, SearchOrigin::File, "timeout", Duration::ZERO),
            ],
        };
        assert_eq!(round.succeeded(), 1);
        assert_eq!(round.failed(), 1);
        assert!(round.results[1].summary.is_empty());
    }
}
