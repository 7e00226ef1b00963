//! Quality-driven refinement loop.
//!
//! Evaluates the current draft, accepts it when every evaluator passes,
//! and otherwise revises it until the iteration budget runs out. The best
//! draft seen so far is always retrievable.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::evaluator::{EvaluatorSet, combined_feedback};
use super::message::TokenUsage;
use super::provider::LlmProvider;
use super::spec::AgentSpec;
use super::synthesizer::SynthesizerAgent;
use super::trace::{TraceEvent, TraceSink};
use crate::core::{DraftReport, EvaluationResult, ResearchCategory, ScoreSummary, all_passed};
use crate::error::{ResearchError, Stage};

/// Position of a session in the refinement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Searches planned, no draft yet.
    Planned,
    /// A draft awaits evaluation.
    Synthesized,
    /// The current draft has been scored.
    Evaluated,
    /// A revision is being written.
    Refining,
    /// The current draft met the threshold.
    Accepted,
    /// The budget ran out; the best draft is final.
    Exhausted,
    /// The session was cancelled.
    Cancelled,
}

impl LoopState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted | Self::Cancelled)
    }

    const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Planned | Self::Refining, Self::Synthesized)
                | (Self::Synthesized, Self::Evaluated)
                | (
                    Self::Evaluated,
                    Self::Accepted | Self::Refining | Self::Exhausted
                )
                | (Self::Refining, Self::Exhausted)
        ) || (!self.is_terminal() && matches!(next, Self::Cancelled))
    }
}

/// How a completed loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStatus {
    /// A draft passed every evaluator.
    Accepted,
    /// No draft passed within the budget.
    Exhausted,
}

impl RefinementStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for RefinementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluated draft.
#[derive(Debug, Clone, Serialize)]
pub struct Iteration {
    /// The draft.
    pub draft: DraftReport,
    /// Its evaluations.
    pub evaluations: Vec<EvaluationResult>,
    /// Aggregate used for best-draft selection.
    pub summary: ScoreSummary,
    /// Whether every evaluator passed.
    pub passed: bool,
}

/// Mutable state of one session's loop.
#[derive(Debug, Clone)]
pub struct RefinementState {
    iteration: usize,
    current: DraftReport,
    best: Option<usize>,
    history: Vec<Iteration>,
    state: LoopState,
}

impl RefinementState {
    /// Starts the loop with the initial draft as iteration 1.
    #[must_use]
    pub fn new(initial: DraftReport) -> Self {
        let mut state = Self {
            iteration: 1,
            current: initial,
            best: None,
            history: Vec::new(),
            state: LoopState::Planned,
        };
        state.transition(LoopState::Synthesized);
        state
    }

    /// Drafts produced so far.
    #[must_use]
    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    /// The current draft.
    #[must_use]
    pub const fn current(&self) -> &DraftReport {
        &self.current
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Evaluated drafts in order.
    #[must_use]
    pub fn history(&self) -> &[Iteration] {
        &self.history
    }

    /// Consumes the state, returning the history.
    #[must_use]
    pub fn into_history(self) -> Vec<Iteration> {
        self.history
    }

    /// Best evaluated draft so far.
    #[must_use]
    pub fn best(&self) -> Option<&Iteration> {
        self.best.and_then(|i| self.history.get(i))
    }

    /// Best evaluated draft, or the current draft if none was evaluated.
    #[must_use]
    pub fn best_draft(&self) -> &DraftReport {
        self.best().map_or(&self.current, |it| &it.draft)
    }

    /// Most recent evaluated draft.
    #[must_use]
    pub fn latest(&self) -> Option<&Iteration> {
        self.history.last()
    }

    /// Moves to `next`. Invalid transitions are logged and ignored.
    pub fn transition(&mut self, next: LoopState) -> bool {
        if !self.state.can_transition(next) {
            warn!(from = ?self.state, to = ?next, "invalid refinement transition");
            return false;
        }
        debug!(from = ?self.state, to = ?next, iteration = self.iteration, "refinement transition");
        self.state = next;
        true
    }

    /// Records the evaluations of the current draft. Returns whether it passed.
    ///
    /// The best draft changes only on a strictly greater [`ScoreSummary`].
    pub fn record(&mut self, evaluations: Vec<EvaluationResult>) -> bool {
        let summary = ScoreSummary::of(&evaluations);
        let passed = all_passed(&evaluations);
        let improved = self.best().is_none_or(|b| summary.beats(&b.summary));

        self.history.push(Iteration {
            draft: self.current.clone(),
            evaluations,
            summary,
            passed,
        });
        if improved {
            self.best = Some(self.history.len() - 1);
        }
        self.transition(LoopState::Evaluated);
        passed
    }

    /// Replaces the current draft with a revision.
    pub fn advance(&mut self, draft: DraftReport) {
        self.current = draft;
        self.iteration += 1;
        self.transition(LoopState::Synthesized);
    }

    fn cancelled(&mut self, stage: Stage) -> ResearchError {
        let best = Box::new(self.best_draft().clone());
        self.transition(LoopState::Cancelled);
        ResearchError::Cancelled {
            stage,
            best: Some(best),
        }
    }
}

/// Result of a finished loop.
#[derive(Debug, Clone)]
pub struct Refined {
    /// Final state.
    pub state: RefinementState,
    /// How the loop ended.
    pub status: RefinementStatus,
    /// Usage over all evaluations and revisions.
    pub usage: TokenUsage,
}

impl Refined {
    /// The final iteration: the accepted draft, or the best one.
    #[must_use]
    pub fn final_iteration(&self) -> Option<&Iteration> {
        match self.status {
            RefinementStatus::Accepted => self.state.latest(),
            RefinementStatus::Exhausted => self.state.best(),
        }
    }
}

/// Inputs of one refinement loop.
#[derive(Debug, Clone, Copy)]
pub struct RefinementLoop<'a> {
    /// Writes revisions.
    pub synthesizer: &'a SynthesizerAgent,
    /// Revision agent for the session's category.
    pub reviser: &'a AgentSpec,
    /// Evaluators for the session's category.
    pub evaluators: &'a EvaluatorSet,
    /// The research query.
    pub query: &'a str,
    /// The session's category.
    pub category: ResearchCategory,
    /// Maximum number of drafts. Zero behaves like one.
    pub max_iterations: usize,
}

impl RefinementLoop<'_> {
    /// Runs the loop starting from `initial`.
    ///
    /// A failed revision ends the loop as [`RefinementStatus::Exhausted`]
    /// with the best draft so far.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Cancelled`] with the best draft when
    /// `cancel` fires before an evaluation or revision.
    pub async fn run(
        &self,
        provider: &dyn LlmProvider,
        initial: DraftReport,
        sink: &dyn TraceSink,
        cancel: &CancellationToken,
    ) -> Result<Refined, ResearchError> {
        let budget = self.max_iterations.max(1);
        let mut state = RefinementState::new(initial);
        let mut usage = TokenUsage::default();

        loop {
            if cancel.is_cancelled() {
                return Err(state.cancelled(Stage::Evaluation));
            }

            let evaluated = self
                .evaluators
                .evaluate(provider, self.query, state.current())
                .await;
            usage.accumulate(&evaluated.usage);
            let passed = state.record(evaluated.evaluations);

            if let Some(latest) = state.latest() {
                info!(
                    iteration = state.iteration(),
                    version = latest.draft.version,
                    min_score = latest.summary.min,
                    mean_score = latest.summary.mean,
                    passed,
                    "draft evaluated"
                );
                sink.record(&TraceEvent::Evaluated {
                    iteration: state.iteration(),
                    version: latest.draft.version,
                    evaluations: latest.evaluations.clone(),
                    summary: latest.summary,
                    passed,
                });
            }

            if passed {
                state.transition(LoopState::Accepted);
                return Ok(Refined {
                    state,
                    status: RefinementStatus::Accepted,
                    usage,
                });
            }

            if state.iteration() >= budget {
                info!(iterations = state.iteration(), "iteration budget exhausted");
                state.transition(LoopState::Exhausted);
                return Ok(Refined {
                    state,
                    status: RefinementStatus::Exhausted,
                    usage,
                });
            }

            state.transition(LoopState::Refining);
            if cancel.is_cancelled() {
                return Err(state.cancelled(Stage::Revision));
            }

            let feedback = state
                .latest()
                .map(|it| combined_feedback(&it.evaluations))
                .unwrap_or_default();
            let from = state.current().version;
            let to = state.iteration();

            match self
                .synthesizer
                .revise(
                    self.reviser,
                    provider,
                    self.query,
                    self.category,
                    state.current(),
                    &feedback,
                    to,
                )
                .await
            {
                Ok(drafted) => {
                    usage.accumulate(&drafted.usage);
                    sink.record(&TraceEvent::Revised { from, to });
                    state.advance(drafted.report);
                }
                Err(e) => {
                    warn!(error = %e, iteration = state.iteration(), "revision failed, keeping best draft");
                    state.transition(LoopState::Exhausted);
                    return Ok(Refined {
                        state,
                        status: RefinementStatus::Exhausted,
                        usage,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::evaluator::{QualityAssessment, StandardsAssessment};
    use crate::agent::executor::ToolExecutor;
    use crate::agent::message::{ChatRequest, ChatResponse};
    use crate::agent::spec::OutputContract;
    use crate::agent::trace::NoopSink;
    use crate::error::AgentError;

    fn draft(version: usize) -> DraftReport {
        DraftReport {
            short_summary: format!("Summary {version}."),
            markdown_report: format!("# Draft {version}"),
            follow_up_questions: vec![],
            key_insights: vec![],
            information_gaps: vec![],
            version,
        }
    }

    fn eval(score: f64) -> Vec<EvaluationResult> {
        vec![
            EvaluationResult::scored("quality", score, "", vec![], 8.5),
            EvaluationResult::scored("standards", score, "", vec![], 8.5),
        ]
    }

    #[test]
    fn test_best_requires_strict_improvement() {
        let mut state = RefinementState::new(draft(0));
        state.record(eval(7.0));
        state.transition(LoopState::Refining);
        state.advance(draft(1));
        state.record(eval(7.0));
        assert_eq!(state.best_draft().version, 0);
        state.transition(LoopState::Refining);
        state.advance(draft(2));
        state.record(eval(7.5));
        assert_eq!(state.best_draft().version, 2);
        assert_eq!(state.history().len(), 3);
        assert_eq!(state.iteration(), 3);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut state = RefinementState::new(draft(0));
        assert!(!state.transition(LoopState::Accepted));
        assert_eq!(state.state(), LoopState::Synthesized);
        assert!(state.transition(LoopState::Cancelled));
        assert!(!state.transition(LoopState::Synthesized));
    }

    /// Scores drafts from a fixed list (one score per evaluation round);
    /// revisions echo the version they were asked for.
    struct Scripted {
        scores: Mutex<Vec<f64>>,
        fail_revision: bool,
    }

    #[async_trait]
    impl crate::agent::provider::LlmProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let content = match request.agent.as_str() {
                "reviser" => {
                    if self.fail_revision {
                        return Err(AgentError::ApiRequest {
                            message: "invalid request".into(),
                            status: Some(400),
                        });
                    }
                    r##"{"short_summary": "Revised.", "markdown_report": "# Revised", "follow_up_questions": []}"##.to_string()
                }
                "quality" => {
                    let score = self
                        .scores
                        .lock()
                        .ok()
                        .and_then(|mut s| (!s.is_empty()).then(|| s.remove(0)))
                        .unwrap_or(0.0);
                    format!(r#"{{"score": {score}, "feedback": "fb"}}"#)
                }
                _ => r#"{"overall_score": 10, "summary_feedback": "fine"}"#.to_string(),
            };
            Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                tool_calls: vec![],
                finish_reason: Some("stop".into()),
            })
        }
    }

    fn evaluators() -> EvaluatorSet {
        EvaluatorSet::new(
            AgentSpec::new("quality", "m", "judge")
                .with_output(OutputContract::structured::<QualityAssessment>("QualityAssessment")),
            AgentSpec::new("standards", "m", "judge")
                .with_output(OutputContract::structured::<StandardsAssessment>("StandardsAssessment")),
            ToolExecutor::new(),
            8.5,
        )
    }

    async fn run_loop(scores: &[f64], max_iterations: usize, fail_revision: bool) -> Refined {
        let provider = Scripted {
            scores: Mutex::new(scores.to_vec()),
            fail_revision,
        };
        let synthesizer = SynthesizerAgent::default();
        let reviser = AgentSpec::new("reviser", "m", "revise")
            .with_output(OutputContract::structured::<DraftReport>("DraftReport"));
        let evaluators = evaluators();
        RefinementLoop {
            synthesizer: &synthesizer,
            reviser: &reviser,
            evaluators: &evaluators,
            query: "q",
            category: ResearchCategory::Technical,
            max_iterations,
        }
        .run(&provider, draft(0), &NoopSink, &CancellationToken::new())
        .await
        .unwrap_or_else(|e| panic!("loop failed: {e}"))
    }

    #[tokio::test]
    async fn test_accepts_on_first_pass() {
        let refined = run_loop(&[9.0], 3, false).await;
        assert_eq!(refined.status, RefinementStatus::Accepted);
        assert_eq!(refined.state.history().len(), 1);
    }

    #[tokio::test]
    async fn test_accepts_after_revision() {
        let refined = run_loop(&[6.0, 9.0], 3, false).await;
        assert_eq!(refined.status, RefinementStatus::Accepted);
        assert_eq!(refined.state.iteration(), 2);
        let final_draft = &refined.final_iteration().unwrap_or_else(|| panic!("no draft")).draft;
        assert_eq!(final_draft.version, 1);
    }

    #[tokio::test]
    async fn test_exhausted_returns_best() {
        let refined = run_loop(&[7.0, 8.0, 6.0], 3, false).await;
        assert_eq!(refined.status, RefinementStatus::Exhausted);
        assert_eq!(refined.state.history().len(), 3);
        let best = refined.final_iteration().unwrap_or_else(|| panic!("no draft"));
        assert_eq!(best.draft.version, 1);
        assert!((best.summary.min - 8.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_zero_and_one_iterations_evaluate_once() {
        for max in [0, 1] {
            let refined = run_loop(&[5.0, 9.0], max, false).await;
            assert_eq!(refined.status, RefinementStatus::Exhausted);
            assert_eq!(refined.state.history().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_failed_revision_ends_exhausted() {
        let refined = run_loop(&[5.0, 9.0], 3, true).await;
        assert_eq!(refined.status, RefinementStatus::Exhausted);
        assert_eq!(refined.state.history().len(), 1);
        assert_eq!(refined.final_iteration().map(|i| i.draft.version), Some(0));
    }

    #[tokio::test]
    async fn test_cancel_returns_best_draft() {
        let provider = Scripted {
            scores: Mutex::new(vec![]),
            fail_revision: false,
        };
        let synthesizer = SynthesizerAgent::default();
        let reviser = AgentSpec::new("reviser", "m", "revise");
        let evaluators = evaluators();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = RefinementLoop {
            synthesizer: &synthesizer,
            reviser: &reviser,
            evaluators: &evaluators,
            query: "q",
            category: ResearchCategory::Technical,
            max_iterations: 3,
        }
        .run(&provider, draft(0), &NoopSink, &cancel)
        .await;
        match result {
            Err(ResearchError::Cancelled { stage, best }) => {
                assert_eq!(stage, Stage::Evaluation);
                assert_eq!(best.map(|b| b.version), Some(0));
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
