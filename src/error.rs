//! Error types for research-rs.
//!
//! Errors are layered: [`AgentError`] covers a single agent invocation
//! (completion call, tool execution, response parsing), [`ResearchError`]
//! covers a research session and always names the failing [`Stage`], and
//! [`CommandError`] covers the CLI glue. [`Error`] unifies them for the
//! binary.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::core::DraftReport;

/// Result alias used by the CLI layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A research session failed.
    #[error(transparent)]
    Research(#[from] ResearchError),

    /// A CLI command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// An agent-level error escaped outside a session (e.g. configuration).
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of agent failures, driving retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Network, timeout, rate limit or server error. Worth retrying.
    Transient,
    /// Response did not match the required structured contract.
    Schema,
    /// Anything else. Retrying will not help.
    Permanent,
}

/// Errors raised while invoking an agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// No API key configured.
    #[error("API key missing: set OPENAI_API_KEY or RESEARCH_API_KEY")]
    ApiKeyMissing,

    /// Provider name not recognised.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
    },

    /// The completion service rejected or failed the request.
    #[error("API request failed{}: {message}", status.map_or_else(String::new, |s| format!(" ({s})")))]
    ApiRequest {
        /// Error message from the service.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// Connection-level failure before a response was received.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error message.
        message: String,
    },

    /// The call did not finish within its timeout.
    #[error("call timed out after {:.1}s", elapsed.as_secs_f64())]
    Timeout {
        /// Configured timeout that elapsed.
        elapsed: Duration,
    },

    /// The response could not be parsed into the expected contract.
    #[error("response parse error: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// A capability tool failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// The model kept requesting tools past the iteration limit.
    #[error("tool loop exceeded {max_iterations} iterations")]
    ToolLoopExceeded {
        /// Configured limit.
        max_iterations: usize,
    },

    /// The agent requires a capability that is not available.
    #[error("capability unavailable: {name}")]
    CapabilityUnavailable {
        /// Capability name.
        name: String,
    },
}

impl AgentError {
    /// Classifies this error for retry decisions.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => ErrorKind::Transient,
            Self::ApiRequest { message, status } => {
                if status.is_some_and(|s| s == 408 || s == 429 || s >= 500)
                    || is_transient_message(message)
                {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Permanent
                }
            }
            Self::ResponseParse { .. } => ErrorKind::Schema,
            Self::ApiKeyMissing
            | Self::UnsupportedProvider { .. }
            | Self::ToolExecution { .. }
            | Self::ToolLoopExceeded { .. }
            | Self::CapabilityUnavailable { .. } => ErrorKind::Permanent,
        }
    }

    /// Returns `true` if retrying the call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Heuristic detection of retryable failures from service error text.
fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "429",
        "rate limit",
        "rate_limit",
        "overloaded",
        "500",
        "502",
        "503",
        "504",
        "server error",
        "server_error",
        "bad gateway",
        "service unavailable",
        "gateway timeout",
        "timed out",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Pipeline stage, used to identify where a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Query classification.
    Routing,
    /// Search planning.
    Planning,
    /// Concurrent search round.
    Searching,
    /// Initial report synthesis.
    Synthesis,
    /// Draft evaluation.
    Evaluation,
    /// Draft revision.
    Revision,
}

impl Stage {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Routing => "routing",
            Self::Planning => "planning",
            Self::Searching => "searching",
            Self::Synthesis => "synthesis",
            Self::Evaluation => "evaluation",
            Self::Revision => "revision",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a research session.
#[derive(Error, Debug)]
pub enum ResearchError {
    /// The query or its configuration is unusable.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Why the query was rejected.
        message: String,
    },

    /// A stage exhausted its retries.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Failing stage.
        stage: Stage,
        /// Underlying agent error.
        #[source]
        source: AgentError,
    },

    /// The planner produced no search tasks, even after re-planning.
    #[error("planning stage failed: no search tasks after {attempts} attempts")]
    EmptyPlan {
        /// Planning attempts made.
        attempts: usize,
    },

    /// Too few search dispatches succeeded to synthesize a report.
    #[error(
        "searching stage failed: {succeeded} of {dispatched} searches succeeded, {required} required"
    )]
    InsufficientEvidence {
        /// Successful dispatches.
        succeeded: usize,
        /// Total dispatches.
        dispatched: usize,
        /// Configured minimum.
        required: usize,
    },

    /// The session was cancelled at a stage boundary.
    #[error("cancelled before {stage} stage")]
    Cancelled {
        /// Stage that was about to start.
        stage: Stage,
        /// Best draft produced before cancellation.
        best: Option<Box<DraftReport>>,
    },

    /// Configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(#[from] AgentError),
}

impl ResearchError {
    /// Wraps an agent error as a fatal failure of `stage`.
    #[must_use]
    pub const fn stage(stage: Stage, source: AgentError) -> Self {
        Self::Stage { stage, source }
    }

    /// Stage that failed, if the error is stage-specific.
    #[must_use]
    pub const fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } | Self::Cancelled { stage, .. } => Some(*stage),
            Self::EmptyPlan { .. } => Some(Stage::Planning),
            Self::InsufficientEvidence { .. } => Some(Stage::Searching),
            Self::InvalidQuery { .. } | Self::Config(_) => None,
        }
    }
}

/// CLI command errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be formatted.
    #[error("output format error: {0}")]
    OutputFormat(String),
}
