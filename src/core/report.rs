//! Draft report: one versioned snapshot of the synthesized report.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A synthesized research report.
///
/// The first three fields form the required structured contract: a
/// response missing any of them fails to deserialize. Each refinement
/// iteration produces a new `DraftReport`; earlier drafts are never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DraftReport {
    /// A short 2-3 sentence summary of the findings.
    pub short_summary: String,
    /// The full report in markdown, with headings and inline citations.
    pub markdown_report: String,
    /// Suggested follow-up questions for further research.
    pub follow_up_questions: Vec<String>,
    /// Key insights or takeaways from the research.
    #[serde(default)]
    pub key_insights: Vec<String>,
    /// Areas where information was limited or contradictory.
    #[serde(default)]
    pub information_gaps: Vec<String>,
    /// Draft number within the session (0 = initial synthesis).
    #[serde(default)]
    #[schemars(skip)]
    pub version: usize,
}

impl DraftReport {
    /// Checks that the required text fields carry content.
    ///
    /// # Errors
    ///
    /// Returns a description of the first empty required field.
    pub fn validate(&self) -> Result<(), String> {
        if self.short_summary.trim().is_empty() {
            return Err("`short_summary` is empty".to_string());
        }
        if self.markdown_report.trim().is_empty() {
            return Err("`markdown_report` is empty".to_string());
        }
        Ok(())
    }

    /// Returns a copy stamped with `version`.
    #[must_use]
    pub fn with_version(mut self, version: usize) -> Self {
        self.version = version;
        self
    }

    /// Approximate word count of the markdown body.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.markdown_report.split_whitespace().count()
    }
}
