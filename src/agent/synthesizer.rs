//! Synthesizer agent.
//!
//! Writes the initial [`DraftReport`] from the successful search results
//! and produces revised drafts during refinement. An answer that does not
//! match the report contract is retried once with the parse error and
//! schema attached.

use tracing::{debug, warn};

use super::executor::ToolExecutor;
use super::invoke::{invoke, parse_structured};
use super::message::TokenUsage;
use super::prompt::{build_correction, build_revision_prompt, build_synthesis_prompt};
use super::provider::LlmProvider;
use super::spec::{AgentSpec, OutputContract};
use crate::core::{DraftReport, ResearchCategory, SearchRound};
use crate::error::AgentError;

/// Attempts per draft, including the corrective retry.
const MAX_WRITE_ATTEMPTS: usize = 2;

/// A produced draft with its accounting.
#[derive(Debug, Clone)]
pub struct Drafted {
    /// The draft, stamped with its version.
    pub report: DraftReport,
    /// Attempts used (1 or 2).
    pub attempts: usize,
    /// Usage over all attempts.
    pub usage: TokenUsage,
}

/// Writes and revises drafts.
#[derive(Debug, Clone, Default)]
pub struct SynthesizerAgent {
    executor: ToolExecutor,
}

impl SynthesizerAgent {
    /// Creates a synthesizer whose writers may use `executor`'s capabilities.
    #[must_use]
    pub const fn new(executor: ToolExecutor) -> Self {
        Self { executor }
    }

    /// Writes the first draft (version 0) from `round`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the completion fails or both attempts
    /// produce an invalid report.
    pub async fn synthesize(
        &self,
        writer: &AgentSpec,
        provider: &dyn LlmProvider,
        query: &str,
        category: ResearchCategory,
        round: &SearchRound,
    ) -> Result<Drafted, AgentError> {
        let successful: Vec<_> = round.successful().collect();
        let input = build_synthesis_prompt(query, category, &successful, round.failed());
        debug!(
            evidence = successful.len(),
            failed = round.failed(),
            "synthesizing initial draft"
        );
        self.write(writer, provider, &input, 0).await
    }

    /// Writes draft `version` from `draft` and evaluator `feedback`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the completion fails or both attempts
    /// produce an invalid report.
    pub async fn revise(
        &self,
        reviser: &AgentSpec,
        provider: &dyn LlmProvider,
        query: &str,
        category: ResearchCategory,
        draft: &DraftReport,
        feedback: &str,
        version: usize,
    ) -> Result<Drafted, AgentError> {
        let input = build_revision_prompt(query, category, draft, feedback);
        debug!(from = draft.version, to = version, "revising draft");
        self.write(reviser, provider, &input, version).await
    }

    async fn write(
        &self,
        spec: &AgentSpec,
        provider: &dyn LlmProvider,
        input: &str,
        version: usize,
    ) -> Result<Drafted, AgentError> {
        let mut usage = TokenUsage::default();
        let mut current = input.to_string();
        let mut last_error = None;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let response = invoke(spec, provider, &self.executor, &current).await?;
            usage.accumulate(&response.usage);

            match Self::parse_report(&response.content) {
                Ok(report) => {
                    return Ok(Drafted {
                        report: report.with_version(version),
                        attempts: attempt,
                        usage,
                    });
                }
                Err(e) => {
                    warn!(agent = %spec.name, attempt, error = %e, "draft rejected");
                    if let OutputContract::Structured { schema, .. } = &spec.output {
                        current = build_correction(input, &e.to_string(), schema);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(AgentError::ResponseParse {
            message: "no draft produced".to_string(),
            content: String::new(),
        }))
    }

    fn parse_report(content: &str) -> Result<DraftReport, AgentError> {
        let report: DraftReport = parse_structured("DraftReport", content)?;
        report
            .validate()
            .map_err(|message| AgentError::ResponseParse {
                message: format!("Invalid DraftReport: {message}"),
                content: content.to_string(),
            })?;
        Ok(report)
    }
}
