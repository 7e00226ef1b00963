//! Search coordinator.
//!
//! Fans the planned tasks out to the web and file search agents under a
//! concurrency limit. Every dispatch produces exactly one
//! [`SearchResult`]; failures and timeouts are recorded as failed results
//! rather than aborting the round. A dispatch whose agent must use its tools
//! but had no tool call succeed is a failure too, whatever text it wrote.
//! A panicking dispatch is recorded as failed only when panics unwind; the
//! release profile sets `panic = "abort"`, so there a panic ends the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor::ToolExecutor;
use super::invoke::invoke;
use super::message::TokenUsage;
use super::prompt::build_search_prompt;
use super::provider::LlmProvider;
use super::spec::AgentSpec;
use crate::core::{SearchMode, SearchOrigin, SearchResult, SearchRound, SearchTask, TaskStatus};
use crate::error::{ResearchError, Stage};

/// Limits for one search round.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    /// Concurrent dispatches.
    pub max_concurrency: usize,
    /// Timeout per dispatch, including its tool loop.
    pub search_timeout: Duration,
    /// Delay after acquiring a permit.
    pub request_delay: Duration,
    /// Successful dispatches required for a usable round.
    pub min_successful: usize,
}

/// Outcome of a search round.
#[derive(Debug, Clone)]
pub struct Searched {
    /// Tasks and results.
    pub round: SearchRound,
    /// Usage over all dispatches.
    pub usage: TokenUsage,
}

/// Runs search rounds.
#[derive(Debug, Clone)]
pub struct SearchCoordinator {
    web_agent: AgentSpec,
    file_agent: AgentSpec,
    executor: ToolExecutor,
    limits: SearchLimits,
}

impl SearchCoordinator {
    /// Creates a coordinator. `executor` must carry the backends `run` will use.
    #[must_use]
    pub const fn new(
        web_agent: AgentSpec,
        file_agent: AgentSpec,
        executor: ToolExecutor,
        limits: SearchLimits,
    ) -> Self {
        Self {
            web_agent,
            file_agent,
            executor,
            limits,
        }
    }

    /// Dispatches every task according to `mode` and collects the results.
    ///
    /// Each task is dispatched [`SearchMode::dispatches_per_task`] times.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InsufficientEvidence`] when fewer than
    /// `min_successful` dispatches succeed, or
    /// [`ResearchError::Cancelled`] if `cancel` fires mid-round.
    pub async fn run(
        &self,
        provider: Arc<dyn LlmProvider>,
        mut tasks: Vec<SearchTask>,
        mode: SearchMode,
        cancel: &CancellationToken,
    ) -> Result<Searched, ResearchError> {
        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrency.max(1)));
        let mut set = JoinSet::new();
        let mut dispatched: HashMap<tokio::task::Id, (usize, SearchOrigin)> = HashMap::new();

        let mut origins = Vec::with_capacity(mode.dispatches_per_task());
        if mode.uses_web() {
            origins.push(SearchOrigin::Web);
        }
        if mode.uses_files() {
            origins.push(SearchOrigin::File);
        }

        for (index, task) in tasks.iter_mut().enumerate() {
            task.transition(TaskStatus::Running);
            for &origin in &origins {
                let spec = match origin {
                    SearchOrigin::Web => self.web_agent.clone(),
                    SearchOrigin::File => self.file_agent.clone(),
                };
                let job = Dispatch {
                    spec,
                    provider: Arc::clone(&provider),
                    executor: self.executor.clone(),
                    task: task.clone(),
                    origin,
                    semaphore: Arc::clone(&semaphore),
                    limits: self.limits,
                };
                let handle = set.spawn(job.run());
                dispatched.insert(handle.id(), (index, origin));
            }
        }

        let expected = tasks.len() * mode.dispatches_per_task();
        debug_assert_eq!(dispatched.len(), expected, "dispatch count mismatch");
        info!(
            tasks = tasks.len(),
            dispatches = expected,
            mode = %mode,
            concurrency = self.limits.max_concurrency,
            "search round started"
        );

        let mut results = Vec::with_capacity(expected);
        let mut usage = TokenUsage::default();

        loop {
            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    set.abort_all();
                    return Err(ResearchError::Cancelled { stage: Stage::Searching, best: None });
                }
                joined = set.join_next_with_id() => joined,
            };
            let Some(joined) = joined else { break };

            match joined {
                Ok((_, (result, step_usage))) => {
                    usage.accumulate(&step_usage);
                    results.push(result);
                }
                Err(e) => {
                    let Some(&(index, origin)) = dispatched.get(&e.id()) else {
                        continue;
                    };
                    warn!(task = index, origin = origin.as_str(), error = %e, "search dispatch aborted");
                    results.push(SearchResult::failed(
                        &tasks[index],
                        origin,
                        format!("dispatch aborted: {e}"),
                        Duration::ZERO,
                    ));
                }
            }
        }

        debug_assert_eq!(results.len(), expected, "search result count mismatch");

        for task in &mut tasks {
            let ok = results.iter().any(|r| r.task_id == task.id && r.success);
            task.transition(if ok {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            });
        }

        let round = SearchRound { tasks, results };
        let succeeded = round.succeeded();
        info!(
            succeeded,
            failed = round.failed(),
            "search round finished"
        );

        if succeeded < self.limits.min_successful.max(1) {
            return Err(ResearchError::InsufficientEvidence {
                succeeded,
                dispatched: round.results.len(),
                required: self.limits.min_successful.max(1),
            });
        }

        Ok(Searched { round, usage })
    }
}

/// One spawned search dispatch.
struct Dispatch {
    spec: AgentSpec,
    provider: Arc<dyn LlmProvider>,
    executor: ToolExecutor,
    task: SearchTask,
    origin: SearchOrigin,
    semaphore: Arc<Semaphore>,
    limits: SearchLimits,
}

impl Dispatch {
    async fn run(self) -> (SearchResult, TokenUsage) {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return (
                SearchResult::failed(&self.task, self.origin, "semaphore closed", Duration::ZERO),
                TokenUsage::default(),
            );
        };

        if !self.limits.request_delay.is_zero() {
            tokio::time::sleep(self.limits.request_delay).await;
        }

        let start = Instant::now();
        let input = build_search_prompt(&self.task);
        let outcome = tokio::time::timeout(
            self.limits.search_timeout,
            invoke(&self.spec, self.provider.as_ref(), &self.executor, &input),
        )
        .await;
        let elapsed = start.elapsed();

        let (result, usage) = match outcome {
            Ok(Ok(response)) if self.spec.require_tool_use && response.tools.succeeded == 0 => (
                SearchResult::failed(
                    &self.task,
                    self.origin,
                    format!(
                        "no evidence gathered: {} tool call(s), none succeeded",
                        response.tools.calls
                    ),
                    elapsed,
                ),
                response.usage,
            ),
            Ok(Ok(response)) if !response.content.trim().is_empty() => (
                SearchResult::completed(&self.task, self.origin, response.content, elapsed),
                response.usage,
            ),
            Ok(Ok(response)) => (
                SearchResult::failed(&self.task, self.origin, "empty summary", elapsed),
                response.usage,
            ),
            Ok(Err(e)) => (
                SearchResult::failed(&self.task, self.origin, e.to_string(), elapsed),
                TokenUsage::default(),
            ),
            Err(_) => (
                SearchResult::failed(
                    &self.task,
                    self.origin,
                    format!(
                        "timed out after {:.1}s",
                        self.limits.search_timeout.as_secs_f64()
                    ),
                    elapsed,
                ),
                TokenUsage::default(),
            ),
        };

        if result.success {
            debug!(
                task = self.task.id,
                origin = self.origin.as_str(),
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "search dispatch completed"
            );
        } else {
            warn!(
                task = self.task.id,
                origin = self.origin.as_str(),
                error = result.error.as_deref().unwrap_or_default(),
                "search dispatch failed"
            );
        }

        (result, usage)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse, Role};
    use crate::agent::spec::Capability;
    use crate::agent::tool::ToolCall;
    use crate::agent::websearch::{Unavailable, WebHit, WebSearchBackend};
    use crate::error::AgentError;

    /// Replies based on the search term embedded in the user message.
    struct ScriptedSearch {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedSearch {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedSearch {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let input = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();

            let reply = if input.contains("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            } else if input.contains("fail") {
                Err(AgentError::ApiRequest {
                    message: "bad request".into(),
                    status: Some(400),
                })
            } else if input.contains("blank") {
                Ok("   ".to_string())
            } else if input.contains("panic") {
                panic!("provider exploded");
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(format!("{} summary of {input}", request.agent))
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            reply.map(|content| ChatResponse {
                content,
                usage: TokenUsage {
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    total_tokens: 2,
                },
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    fn coordinator(max_concurrency: usize, min_successful: usize) -> SearchCoordinator {
        SearchCoordinator::new(
            AgentSpec::new("web_searcher", "m", "search the web"),
            AgentSpec::new("file_searcher", "m", "search files"),
            ToolExecutor::new(),
            SearchLimits {
                max_concurrency,
                search_timeout: Duration::from_secs(5),
                request_delay: Duration::ZERO,
                min_successful,
            },
        )
    }

    /// Calls `web_search` once, then summarizes whatever the tool returned.
    struct SearchThenSummarize;

    #[async_trait]
    impl LlmProvider for SearchThenSummarize {
        fn name(&self) -> &'static str {
            "search-then-summarize"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let tool_output = request
                .messages
                .iter()
                .find(|m| m.role == Role::Tool)
                .map(|m| m.content.clone());
            let (content, tool_calls) = match tool_output {
                Some(output) => (format!("Summary (tool said: {output})"), Vec::new()),
                None => (
                    String::new(),
                    vec![ToolCall {
                        id: "call_0".to_string(),
                        name: "web_search".to_string(),
                        arguments: r#"{"query":"evidence"}"#.to_string(),
                    }],
                ),
            };
            Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                tool_calls,
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    struct OneHit;

    #[async_trait]
    impl WebSearchBackend for OneHit {
        fn name(&self) -> &'static str {
            "one-hit"
        }

        async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<WebHit>, AgentError> {
            Ok(vec![WebHit {
                title: query.to_string(),
                url: "https://example.org/".to_string(),
                description: "a finding".to_string(),
            }])
        }
    }

    fn tool_coordinator(backend: Arc<dyn WebSearchBackend>) -> SearchCoordinator {
        SearchCoordinator::new(
            AgentSpec::new("web_searcher", "m", "search the web")
                .with_capability(Capability::WebSearch)
                .with_max_tool_iterations(3)
                .requiring_tool_use(),
            AgentSpec::new("file_searcher", "m", "search files")
                .with_capability(Capability::FileSearch)
                .requiring_tool_use(),
            ToolExecutor::new().with_web(backend, 5),
            SearchLimits {
                max_concurrency: 2,
                search_timeout: Duration::from_secs(5),
                request_delay: Duration::ZERO,
                min_successful: 1,
            },
        )
    }

    fn tasks(queries: &[&str]) -> Vec<SearchTask> {
        queries
            .iter()
            .enumerate()
            .map(|(i, q)| SearchTask::new(i, *q, "reason"))
            .collect()
    }

    #[tokio::test]
    async fn test_one_result_per_dispatch() {
        let provider = Arc::new(ScriptedSearch::new());
        let searched = coordinator(4, 1)
            .run(
                provider,
                tasks(&["a", "b", "c"]),
                SearchMode::WebAndFile,
                &CancellationToken::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("round failed: {e}"));
        assert_eq!(searched.round.results.len(), 6);
        assert_eq!(searched.round.succeeded(), 6);
        assert_eq!(searched.usage.total_tokens, 12);
        assert!(
            searched
                .round
                .tasks
                .iter()
                .all(|t| t.status == TaskStatus::Completed)
        );
        let file_results = searched
            .round
            .results
            .iter()
            .filter(|r| r.origin == SearchOrigin::File)
            .count();
        assert_eq!(file_results, 3);
    }

    #[tokio::test]
    async fn test_concurrency_limit_respected() {
        let provider = Arc::new(ScriptedSearch::new());
        let queries: Vec<String> = (0..12).map(|i| format!("q{i}")).collect();
        let refs: Vec<&str> = queries.iter().map(String::as_str).collect();
        let searched = coordinator(3, 1)
            .run(
                provider.clone(),
                tasks(&refs),
                SearchMode::Web,
                &CancellationToken::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("round failed: {e}"));
        assert_eq!(searched.round.results.len(), 12);
        assert!(provider.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_recorded() {
        let provider = Arc::new(ScriptedSearch::new());
        let searched = coordinator(8, 1)
            .run(
                provider,
                tasks(&["ok", "fail", "slow", "blank", "panic"]),
                SearchMode::Web,
                &CancellationToken::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("round failed: {e}"));
        let round = searched.round;
        assert_eq!(round.results.len(), 5);
        assert_eq!(round.succeeded(), 1);
        assert!(round.results.iter().filter(|r| !r.success).all(|r| r.summary.is_empty()));
        let error_for = |id: usize| {
            round
                .results
                .iter()
                .find(|r| r.task_id == id)
                .and_then(|r| r.error.clone())
                .unwrap_or_default()
        };
        assert!(error_for(1).contains("bad request"));
        assert!(error_for(2).contains("timed out"));
        assert!(error_for(3).contains("empty summary"));
        assert!(error_for(4).contains("aborted"));
        assert_eq!(round.tasks[0].status, TaskStatus::Completed);
        assert_eq!(round.tasks[1].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_insufficient_evidence() {
        let provider = Arc::new(ScriptedSearch::new());
        let result = coordinator(2, 2)
            .run(
                provider,
                tasks(&["ok", "fail", "fail too"]),
                SearchMode::Web,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(ResearchError::InsufficientEvidence {
                succeeded: 1,
                dispatched: 3,
                required: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_round() {
        let provider = Arc::new(ScriptedSearch::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = coordinator(2, 1)
            .run(provider, tasks(&["slow"]), SearchMode::Web, &cancel)
            .await;
        assert!(matches!(
            result,
            Err(ResearchError::Cancelled {
                stage: Stage::Searching,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_summary_without_evidence_is_failure() {
        let result = tool_coordinator(Arc::new(Unavailable))
            .run(
                Arc::new(SearchThenSummarize),
                tasks(&["a", "b"]),
                SearchMode::Web,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(ResearchError::InsufficientEvidence {
                succeeded: 0,
                dispatched: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_answer_without_tool_call_is_failure() {
        let result = tool_coordinator(Arc::new(OneHit))
            .run(
                Arc::new(ScriptedSearch::new()),
                tasks(&["a"]),
                SearchMode::Web,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(ResearchError::InsufficientEvidence { succeeded: 0, dispatched: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_summary_with_evidence_succeeds() {
        let searched = tool_coordinator(Arc::new(OneHit))
            .run(
                Arc::new(SearchThenSummarize),
                tasks(&["a", "b"]),
                SearchMode::Web,
                &CancellationToken::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("round failed: {e}"));
        assert_eq!(searched.round.succeeded(), 2);
        assert!(
            searched
                .round
                .results
                .iter()
                .all(|r| r.summary.contains("a finding"))
        );
    }
}
