//! Orchestrator for research sessions.
//!
//! Coordinates the full pipeline: route → plan → fan-out searches →
//! synthesize → evaluate/revise until the draft passes or the iteration
//! budget runs out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::ResearchConfig;
use super::corpus::FileCorpus;
use super::evaluator::EvaluatorSet;
use super::executor::ToolExecutor;
use super::message::TokenUsage;
use super::planner::PlannerAgent;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::refinement::{Iteration, RefinementLoop, RefinementStatus};
use super::roles::Roster;
use super::router::RouterAgent;
use super::search::{SearchCoordinator, SearchLimits};
use super::synthesizer::SynthesizerAgent;
use super::trace::{NoopSink, TraceEvent, TraceSink};
use super::websearch::{WebSearchBackend, default_backend};
use crate::core::{DraftReport, EvaluationResult, ResearchCategory, ResearchQuery, SearchMode};
use crate::error::{ResearchError, Stage};

/// Final result of a research session.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    /// The research question.
    pub query: String,
    /// Category chosen by the router.
    pub category: ResearchCategory,
    /// Whether the router fell back to the default category.
    pub category_fell_back: bool,
    /// Search mode used.
    pub search_mode: SearchMode,
    /// Final report.
    pub report: DraftReport,
    /// Evaluations of the final report.
    pub evaluations: Vec<EvaluationResult>,
    /// Every evaluated draft, in order.
    pub history: Vec<Iteration>,
    /// Whether the final report passed every evaluator.
    pub met_quality_threshold: bool,
    /// How the refinement loop ended.
    pub status: RefinementStatus,
    /// Drafts produced.
    pub iterations: usize,
    /// Areas the search plan covered.
    pub areas_covered: Vec<String>,
    /// Search dispatches made.
    pub searches_dispatched: usize,
    /// Search dispatches that failed.
    pub searches_failed: usize,
    /// Tokens used across all agents.
    pub total_tokens: u32,
    /// Wall-clock time of the session.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Runs research sessions.
///
/// Holds the provider, configuration and prompts shared by every session;
/// each call to [`run`](Self::run) owns its own state.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: ResearchConfig,
    prompts: PromptSet,
    web: Arc<dyn WebSearchBackend>,
}

impl Orchestrator {
    /// Creates an orchestrator with the given provider and configuration.
    ///
    /// Loads prompt templates from [`ResearchConfig::prompt_dir`], falling
    /// back to compiled-in defaults, and uses the web search backend
    /// compiled into this build.
    pub fn new(provider: Arc<dyn LlmProvider>, config: ResearchConfig) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            config,
            prompts,
            web: default_backend(),
        }
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the web search backend.
    #[must_use]
    pub fn with_web_backend(mut self, backend: Arc<dyn WebSearchBackend>) -> Self {
        self.web = backend;
        self
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Runs a session without tracing or cancellation.
    ///
    /// # Errors
    ///
    /// See [`run_with_cancel`](Self::run_with_cancel).
    pub async fn research(&self, query: &ResearchQuery) -> Result<ResearchOutcome, ResearchError> {
        self.run(query, &NoopSink).await
    }

    /// Runs a session without cancellation, reporting to `sink`.
    ///
    /// # Errors
    ///
    /// See [`run_with_cancel`](Self::run_with_cancel).
    pub async fn run(
        &self,
        query: &ResearchQuery,
        sink: &dyn TraceSink,
    ) -> Result<ResearchOutcome, ResearchError> {
        self.run_with_cancel(query, sink, &CancellationToken::new())
            .await
    }

    /// Runs a full session.
    ///
    /// Every session ends with one terminal trace event: `finished` on
    /// success, `cancelled` or `failed` otherwise.
    ///
    /// # Steps
    ///
    /// 1. Validate the query and load files for file search
    /// 2. Route the query to a category
    /// 3. Plan search tasks
    /// 4. Fan out searches concurrently
    /// 5. Synthesize the initial draft
    /// 6. Evaluate and revise until accepted or exhausted
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError`] naming the failing stage, or
    /// [`ResearchError::Cancelled`] with the best draft so far when
    /// `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        query: &ResearchQuery,
        sink: &dyn TraceSink,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome, ResearchError> {
        let result = self.session(query, sink, cancel).await;
        match &result {
            Ok(_) => {}
            Err(ResearchError::Cancelled { stage, best }) => {
                sink.record(&TraceEvent::Cancelled {
                    stage: *stage,
                    has_draft: best.is_some(),
                });
            }
            Err(e) => sink.record(&TraceEvent::Failed {
                stage: e.failed_stage(),
                error: e.to_string(),
            }),
        }
        result
    }

    #[allow(clippy::too_many_lines)]
    async fn session(
        &self,
        query: &ResearchQuery,
        sink: &dyn TraceSink,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome, ResearchError> {
        query.validate()?;
        let start = Instant::now();
        let mode = query.search_mode;
        let mut usage = TokenUsage::default();

        let executor = self.executor(query)?;
        let roster = Roster::new(&self.config, &self.prompts, mode.uses_web());
        let provider = &*self.provider;

        // Step 1: Route
        check(cancel, Stage::Routing)?;
        let routed = RouterAgent::new(roster.router(), self.config.default_category)
            .route(provider, &query.text)
            .await
            .map_err(|e| ResearchError::stage(Stage::Routing, e))?;
        usage.accumulate(&routed.response.usage);
        let category = routed.category;
        info!(category = %category, fell_back = routed.fell_back, "query routed");
        sink.record(&TraceEvent::Routed {
            category,
            fell_back: routed.fell_back,
        });

        // Step 2: Plan
        check(cancel, Stage::Planning)?;
        let planned = PlannerAgent::new(roster.planner(), self.config.max_searches)
            .plan(provider, &query.text, category)
            .await?;
        usage.accumulate(&planned.usage);
        info!(tasks = planned.tasks.len(), attempts = planned.attempts, "search plan ready");
        sink.record(&TraceEvent::Planned {
            tasks: planned.tasks.len(),
            attempts: planned.attempts,
        });

        // Step 3: Search
        check(cancel, Stage::Searching)?;
        let coordinator = SearchCoordinator::new(
            roster.web_searcher(),
            roster.file_searcher(),
            executor.clone(),
            SearchLimits {
                max_concurrency: self.config.max_concurrency,
                search_timeout: self.config.search_timeout,
                request_delay: self.config.request_delay,
                min_successful: self.config.min_successful_searches,
            },
        );
        let searched = coordinator
            .run(Arc::clone(&self.provider), planned.tasks, mode, cancel)
            .await?;
        usage.accumulate(&searched.usage);
        let round = searched.round;
        sink.record(&TraceEvent::Searched {
            dispatched: round.results.len(),
            succeeded: round.succeeded(),
            failed: round.failed(),
        });

        // Step 4: Synthesize
        check(cancel, Stage::Synthesis)?;
        let synthesizer = SynthesizerAgent::new(executor.clone());
        let drafted = synthesizer
            .synthesize(
                &roster.writer(category),
                provider,
                &query.text,
                category,
                &round,
            )
            .await
            .map_err(|e| ResearchError::stage(Stage::Synthesis, e))?;
        usage.accumulate(&drafted.usage);
        info!(
            attempts = drafted.attempts,
            words = drafted.report.word_count(),
            "initial draft synthesized"
        );
        sink.record(&TraceEvent::Synthesized {
            version: drafted.report.version,
            attempts: drafted.attempts,
        });

        // Step 5: Refine
        let evaluators = EvaluatorSet::new(
            roster.quality_evaluator(),
            roster.standards_evaluator(category),
            executor,
            query.min_quality,
        );
        let reviser = roster.reviser(category);
        let refined = RefinementLoop {
            synthesizer: &synthesizer,
            reviser: &reviser,
            evaluators: &evaluators,
            query: &query.text,
            category,
            max_iterations: query.max_iterations,
        }
        .run(provider, drafted.report, sink, cancel)
        .await?;
        usage.accumulate(&refined.usage);

        let status = refined.status;
        let iterations = refined.state.iteration();
        let (report, evaluations) = refined.final_iteration().map_or_else(
            || (refined.state.best_draft().clone(), Vec::new()),
            |it| (it.draft.clone(), it.evaluations.clone()),
        );
        let met_quality_threshold =
            status == RefinementStatus::Accepted && crate::core::all_passed(&evaluations);
        if !met_quality_threshold {
            warn!(iterations, "quality threshold not met, returning best draft");
        }

        let outcome = ResearchOutcome {
            query: query.text.clone(),
            category,
            category_fell_back: routed.fell_back,
            search_mode: mode,
            report,
            evaluations,
            history: refined.state.into_history(),
            met_quality_threshold,
            status,
            iterations,
            areas_covered: planned.areas_covered,
            searches_dispatched: round.results.len(),
            searches_failed: round.failed(),
            total_tokens: usage.total_tokens,
            elapsed: start.elapsed(),
        };

        info!(
            status = %outcome.status,
            met_quality_threshold,
            iterations,
            total_tokens = outcome.total_tokens,
            elapsed_secs = outcome.elapsed.as_secs_f64(),
            "research session finished"
        );
        sink.record(&TraceEvent::Finished {
            status: outcome.status.to_string(),
            met_quality_threshold,
            iterations,
            total_tokens: outcome.total_tokens,
        });

        Ok(outcome)
    }

    /// Builds the tool executor for the session's search mode.
    fn executor(&self, query: &ResearchQuery) -> Result<ToolExecutor, ResearchError> {
        let mut executor = ToolExecutor::new();
        if query.search_mode.uses_web() {
            executor = executor.with_web(Arc::clone(&self.web), self.config.web_results);
        }
        if query.search_mode.uses_files() {
            let corpus = FileCorpus::load(&query.files)?;
            info!(files = query.files.len(), paragraphs = corpus.len(), "file corpus loaded");
            executor = executor.with_corpus(Arc::new(corpus), self.config.file_passages);
        }
        Ok(executor)
    }
}

fn check(cancel: &CancellationToken, stage: Stage) -> Result<(), ResearchError> {
    if cancel.is_cancelled() {
        warn!(stage = %stage, "session cancelled");
        return Err(ResearchError::Cancelled { stage, best: None });
    }
    Ok(())
}
