//! Evaluator set.
//!
//! Two evaluators score every draft concurrently: a general `quality`
//! rubric and a category-aware `standards` rubric. A failed evaluator
//! yields a conservative failing result instead of an error.

use std::fmt::Write;
use std::pin::Pin;

use futures_util::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::executor::ToolExecutor;
use super::invoke::{AgentResponse, invoke_structured};
use super::message::TokenUsage;
use super::prompt::build_evaluation_prompt;
use super::provider::LlmProvider;
use super::spec::AgentSpec;
use crate::core::{DraftReport, EvaluationResult};
use crate::error::AgentError;

/// Identifier of the general evaluator.
pub const QUALITY_EVALUATOR: &str = "quality";
/// Identifier of the category-aware evaluator.
pub const STANDARDS_EVALUATOR: &str = "standards";

type Outcome = Result<(EvaluationResult, TokenUsage), AgentError>;

/// Structured answer of the quality evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QualityAssessment {
    /// Overall score from 0 to 10.
    pub score: f64,
    /// Detailed feedback on the report.
    pub feedback: String,
    /// Specific, actionable improvements.
    #[serde(default)]
    pub improvements: Vec<String>,
    /// Searches that would fill the gaps found.
    #[serde(default)]
    pub additional_queries: Vec<String>,
}

/// Score for one standards criterion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CriterionEvaluation {
    /// Criterion name.
    pub name: String,
    /// Score from 0 to 10.
    pub score: f64,
    /// Feedback for this criterion.
    pub feedback: String,
    /// How to improve on this criterion.
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
}

/// Structured answer of the standards evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StandardsAssessment {
    /// Overall score from 0 to 10.
    pub overall_score: f64,
    /// One-paragraph verdict.
    pub summary_feedback: String,
    /// Longer discussion of the verdict.
    #[serde(default)]
    pub detailed_feedback: String,
    /// Per-criterion scores.
    #[serde(default)]
    pub criteria_evaluations: Vec<CriterionEvaluation>,
    /// Consolidated improvement suggestions.
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
    /// What the report does well.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// What the report does poorly.
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// The evaluator's own verdict. Informational; the score decides.
    #[serde(default)]
    pub meets_standards: bool,
}

impl QualityAssessment {
    fn into_result(self, threshold: f64) -> EvaluationResult {
        let mut improvements = self.improvements;
        improvements.extend(
            self.additional_queries
                .into_iter()
                .map(|q| format!("Research further: {q}")),
        );
        EvaluationResult::scored(
            QUALITY_EVALUATOR,
            self.score,
            self.feedback,
            improvements,
            threshold,
        )
    }
}

impl StandardsAssessment {
    fn into_result(self, threshold: f64) -> EvaluationResult {
        let mut feedback = self.summary_feedback;
        if !self.detailed_feedback.trim().is_empty() {
            let _ = write!(feedback, "\n\n{}", self.detailed_feedback);
        }
        if !self.weaknesses.is_empty() {
            let _ = write!(feedback, "\n\nWeaknesses:\n- {}", self.weaknesses.join("\n- "));
        }

        let mut improvements = self.improvement_suggestions;
        for criterion in self.criteria_evaluations {
            improvements.extend(
                criterion
                    .improvement_suggestions
                    .into_iter()
                    .map(|s| format!("{}: {s}", criterion.name)),
            );
        }

        EvaluationResult::scored(
            STANDARDS_EVALUATOR,
            self.overall_score,
            feedback,
            improvements,
            threshold,
        )
    }
}

/// Evaluations of one draft.
#[derive(Debug, Clone)]
pub struct Evaluated {
    /// One result per evaluator, in fixed order (quality, standards).
    pub evaluations: Vec<EvaluationResult>,
    /// Usage over all evaluator calls.
    pub usage: TokenUsage,
}

/// The evaluators applied to every draft of a session.
#[derive(Debug, Clone)]
pub struct EvaluatorSet {
    quality: AgentSpec,
    standards: AgentSpec,
    executor: ToolExecutor,
    threshold: f64,
}

impl EvaluatorSet {
    /// Creates an evaluator set with pass threshold `threshold`.
    #[must_use]
    pub const fn new(
        quality: AgentSpec,
        standards: AgentSpec,
        executor: ToolExecutor,
        threshold: f64,
    ) -> Self {
        Self {
            quality,
            standards,
            executor,
            threshold,
        }
    }

    /// Pass threshold applied to every evaluator.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Runs both evaluators concurrently over `draft`.
    pub async fn evaluate(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        draft: &DraftReport,
    ) -> Evaluated {
        let input = build_evaluation_prompt(query, draft);

        let quality = async {
            let result: Result<(QualityAssessment, AgentResponse), AgentError> =
                invoke_structured(&self.quality, provider, &self.executor, &input).await;
            result.map(|(a, r)| (a.into_result(self.threshold), r.usage))
        };
        let standards = async {
            let result: Result<(StandardsAssessment, AgentResponse), AgentError> =
                invoke_structured(&self.standards, provider, &self.executor, &input).await;
            result.map(|(a, r)| (a.into_result(self.threshold), r.usage))
        };

        let futures: Vec<Pin<Box<dyn Future<Output = Outcome> + Send + '_>>> =
            vec![Box::pin(quality), Box::pin(standards)];
        let outcomes = join_all(futures).await;

        let mut usage = TokenUsage::default();
        let evaluations = [QUALITY_EVALUATOR, STANDARDS_EVALUATOR]
            .into_iter()
            .zip(outcomes)
            .map(|(name, outcome)| match outcome {
                Ok((evaluation, call_usage)) => {
                    usage.accumulate(&call_usage);
                    debug!(
                        evaluator = name,
                        score = evaluation.score,
                        passed = evaluation.passed,
                        "evaluation complete"
                    );
                    evaluation
                }
                Err(e) => {
                    warn!(evaluator = name, error = %e, "evaluator failed, scoring as failing");
                    EvaluationResult::unavailable(name, &e)
                }
            })
            .collect();

        Evaluated { evaluations, usage }
    }
}

/// Concatenates feedback and improvements of every evaluator for the reviser.
#[must_use]
pub fn combined_feedback(evaluations: &[EvaluationResult]) -> String {
    let mut out = String::new();
    for e in evaluations {
        let _ = writeln!(out, "## {} evaluator (score {:.1}/10)\n", e.evaluator, e.score);
        if !e.feedback.trim().is_empty() {
            let _ = writeln!(out, "{}\n", e.feedback.trim());
        }
        if !e.improvements.is_empty() {
            out.push_str("Improvements:\n");
            for item in &e.improvements {
                let _ = writeln!(out, "- {item}");
            }
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}
