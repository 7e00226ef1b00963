//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::ResearchOutcome;
use crate::core::DraftReport;
use crate::error::CommandError;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OutputFormat`] if serialization fails.
    pub fn to_json<T: Serialize>(self, value: &T) -> Result<String, CommandError> {
        serde_json::to_string_pretty(value)
            .map_err(|e| CommandError::OutputFormat(format!("JSON serialization failed: {e}")))
    }
}

/// Renders a report as a standalone markdown document.
#[must_use]
pub fn render_markdown(report: &DraftReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "> {}\n", report.short_summary.trim());
    let _ = writeln!(out, "{}", report.markdown_report.trim());

    let sections = [
        ("Key Insights", &report.key_insights),
        ("Information Gaps", &report.information_gaps),
        ("Follow-up Questions", &report.follow_up_questions),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n## {title}\n");
        for item in items {
            let _ = writeln!(out, "- {item}");
        }
    }
    out
}

/// One-line status footer.
#[must_use]
pub fn format_footer(outcome: &ResearchOutcome) -> String {
    let scores = outcome
        .evaluations
        .iter()
        .map(|e| {
            let mark = if e.failed { " (failed)" } else { "" };
            format!("{} {:.1}{mark}", e.evaluator, e.score)
        })
        .collect::<Vec<_>>()
        .join(", ");
    let fallback = if outcome.category_fell_back {
        " (fallback)"
    } else {
        ""
    };
    let quality = if outcome.met_quality_threshold {
        "met"
    } else {
        "not met"
    };
    format!(
        "Category: {}{fallback} | Status: {} | Quality: {quality} | Scores: {scores} | Iterations: {} | Searches: {} ok, {} failed | Tokens: {} | Time: {:.1}s",
        outcome.category,
        outcome.status,
        outcome.iterations,
        outcome.searches_dispatched.saturating_sub(outcome.searches_failed),
        outcome.searches_failed,
        outcome.total_tokens,
        outcome.elapsed.as_secs_f64(),
    )
}

/// Formats a session outcome.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
pub fn format_outcome(outcome: &ResearchOutcome, format: OutputFormat) -> Result<String, CommandError> {
    match format {
        OutputFormat::Text => {
            let mut output = render_markdown(&outcome.report);
            let _ = write!(output, "\n---\n{}\n", format_footer(outcome));
            Ok(output)
        }
        OutputFormat::Json => format.to_json(outcome),
    }
}
