//! Immutable research query and its session-level settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

/// Maximum query length in bytes.
pub const MAX_QUERY_LEN: usize = 10_000;
/// Default maximum number of drafts per session.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;
/// Default quality threshold on the 0-10 scale.
pub const DEFAULT_MIN_QUALITY: f64 = 8.5;
/// Upper bound of the score scale.
pub const SCORE_SCALE_MAX: f64 = 10.0;

/// Which search capabilities a round dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Web search only.
    #[default]
    Web,
    /// Local file search only.
    File,
    /// Both web and file search for every task.
    WebAndFile,
}

impl SearchMode {
    /// Parses a mode string (`web`, `file`, `web_and_file`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "web" => Some(Self::Web),
            "file" | "files" => Some(Self::File),
            "web_and_file" | "both" => Some(Self::WebAndFile),
            _ => None,
        }
    }

    /// Whether web search is dispatched.
    #[must_use]
    pub const fn uses_web(self) -> bool {
        matches!(self, Self::Web | Self::WebAndFile)
    }

    /// Whether file search is dispatched.
    #[must_use]
    pub const fn uses_files(self) -> bool {
        matches!(self, Self::File | Self::WebAndFile)
    }

    /// Number of dispatches per search task.
    #[must_use]
    pub const fn dispatches_per_task(self) -> usize {
        match self {
            Self::Web | Self::File => 1,
            Self::WebAndFile => 2,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::File => "file",
            Self::WebAndFile => "web_and_file",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A research request: query text plus resolved session settings.
///
/// Created once at session start through [`ResearchQuery::new`] and the
/// `with_*` setters, then validated by the orchestrator. Never mutated
/// while a session runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQuery {
    /// The research question.
    pub text: String,
    /// Search capabilities to use.
    pub search_mode: SearchMode,
    /// Maximum number of drafts (synthesis attempts). Zero behaves like one.
    pub max_iterations: usize,
    /// Minimum score every evaluator must reach.
    pub min_quality: f64,
    /// Files searched when the mode includes file search.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
}

impl ResearchQuery {
    /// Creates a query with default settings.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            search_mode: SearchMode::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_quality: DEFAULT_MIN_QUALITY,
            files: Vec::new(),
        }
    }

    /// Sets the search mode.
    #[must_use]
    pub const fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    /// Sets the iteration budget.
    #[must_use]
    pub const fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Sets the quality threshold.
    #[must_use]
    pub const fn with_min_quality(mut self, threshold: f64) -> Self {
        self.min_quality = threshold;
        self
    }

    /// Sets the files for file search.
    #[must_use]
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    /// Checks the query is usable before any agent runs.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidQuery`] for an empty or oversized
    /// query, an out-of-scale threshold, or a file mode without files.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.text.trim().is_empty() {
            return Err(ResearchError::InvalidQuery {
                message: "Query cannot be empty".to_string(),
            });
        }
        if self.text.len() > MAX_QUERY_LEN {
            return Err(ResearchError::InvalidQuery {
                message: format!(
                    "Query exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                    self.text.len()
                ),
            });
        }
        if !(0.0..=SCORE_SCALE_MAX).contains(&self.min_quality) {
            return Err(ResearchError::InvalidQuery {
                message: format!(
                    "Quality threshold {} is outside the 0-{SCORE_SCALE_MAX} scale",
                    self.min_quality
                ),
            });
        }
        if self.search_mode.uses_files() && self.files.is_empty() {
            return Err(ResearchError::InvalidQuery {
                message: format!(
                    "Search mode '{}' requires at least one file (--files)",
                    self.search_mode
                ),
            });
        }
        Ok(())
    }
}
