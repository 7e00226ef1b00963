//! Planner agent.
//!
//! Turns the query into an ordered list of [`SearchTask`]s. A rejected plan
//! (schema mismatch or no usable searches) is retried once with a
//! correction note.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::executor::ToolExecutor;
use super::invoke::{AgentResponse, invoke_structured};
use super::message::TokenUsage;
use super::prompt::build_planner_prompt;
use super::provider::LlmProvider;
use super::spec::AgentSpec;
use crate::core::{ResearchCategory, SearchTask};
use crate::error::{AgentError, ResearchError, Stage};

/// Planning attempts before giving up.
const MAX_PLAN_ATTEMPTS: usize = 2;

/// One planned search.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedSearch {
    /// Why this search is important to the query.
    pub reason: String,
    /// The search term to use.
    pub query: String,
}

/// Structured planner answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchPlan {
    /// Searches to perform.
    pub searches: Vec<PlannedSearch>,
    /// Indices of the searches to run first.
    #[serde(default)]
    pub priority_searches: Vec<usize>,
    /// Areas of the topic the plan covers.
    #[serde(default)]
    pub areas_covered: Vec<String>,
}

impl SearchPlan {
    /// Converts the plan into ordered tasks.
    ///
    /// Priority searches come first in the order listed, then the rest in
    /// plan order. Out-of-range priorities and blank queries are ignored,
    /// case-insensitive duplicates are dropped and the result is cut to
    /// `max_searches`. Task IDs follow the final order.
    #[must_use]
    pub fn into_tasks(self, max_searches: usize) -> Vec<SearchTask> {
        let len = self.searches.len();
        let mut order: Vec<usize> = Vec::with_capacity(len);
        let mut placed = vec![false; len];
        for &i in &self.priority_searches {
            if i < len && !placed[i] {
                placed[i] = true;
                order.push(i);
            }
        }
        order.extend((0..len).filter(|&i| !placed[i]));

        let mut seen = HashSet::new();
        order
            .into_iter()
            .filter_map(|i| {
                let s = &self.searches[i];
                let query = s.query.trim();
                (!query.is_empty() && seen.insert(query.to_lowercase()))
                    .then(|| (query.to_string(), s.reason.trim().to_string()))
            })
            .take(max_searches)
            .enumerate()
            .map(|(id, (query, reason))| SearchTask::new(id, query, reason))
            .collect()
    }
}

/// Outcome of planning.
#[derive(Debug, Clone)]
pub struct Planned {
    /// Ordered tasks, never empty.
    pub tasks: Vec<SearchTask>,
    /// Areas the planner claims to cover.
    pub areas_covered: Vec<String>,
    /// Attempts used.
    pub attempts: usize,
    /// Usage over all attempts.
    pub usage: TokenUsage,
}

/// Agent that plans the search round.
#[derive(Debug, Clone)]
pub struct PlannerAgent {
    spec: AgentSpec,
    max_searches: usize,
}

impl PlannerAgent {
    /// Creates a planner.
    #[must_use]
    pub const fn new(spec: AgentSpec, max_searches: usize) -> Self {
        Self { spec, max_searches }
    }

    /// Plans searches for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::EmptyPlan`] when both attempts yield no
    /// tasks, or a `planning` stage error for completion or schema failures.
    pub async fn plan(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        category: ResearchCategory,
    ) -> Result<Planned, ResearchError> {
        let executor = ToolExecutor::new();
        let mut usage = TokenUsage::default();
        let mut correction: Option<String> = None;
        let mut last_error: Option<AgentError> = None;

        for attempt in 1..=MAX_PLAN_ATTEMPTS {
            let input =
                build_planner_prompt(query, category, self.max_searches, correction.as_deref());
            let result: Result<(SearchPlan, AgentResponse), AgentError> =
                invoke_structured(&self.spec, provider, &executor, &input).await;

            match result {
                Ok((plan, response)) => {
                    usage.accumulate(&response.usage);
                    let areas_covered = plan.areas_covered.clone();
                    let tasks = plan.into_tasks(self.max_searches);
                    if tasks.is_empty() {
                        warn!(attempt, "planner produced no searches");
                        correction = Some("the plan contained no usable searches".to_string());
                        last_error = None;
                        continue;
                    }
                    debug!(attempt, tasks = tasks.len(), "plan accepted");
                    return Ok(Planned {
                        tasks,
                        areas_covered,
                        attempts: attempt,
                        usage,
                    });
                }
                Err(e @ AgentError::ResponseParse { .. }) => {
                    warn!(attempt, error = %e, "planner answer rejected");
                    correction = Some(e.to_string());
                    last_error = Some(e);
                }
                Err(e) => return Err(ResearchError::stage(Stage::Planning, e)),
            }
        }

        Err(last_error.map_or(
            ResearchError::EmptyPlan {
                attempts: MAX_PLAN_ATTEMPTS,
            },
            |e| ResearchError::stage(Stage::Planning, e),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plan(queries: &[&str], priority: &[usize]) -> SearchPlan {
        SearchPlan {
            searches: queries
                .iter()
                .map(|q| PlannedSearch {
                    reason: format!("because {q}"),
                    query: (*q).to_string(),
                })
                .collect(),
            priority_searches: priority.to_vec(),
            areas_covered: vec![],
        }
    }

    fn queries(tasks: &[SearchTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.query.as_str()).collect()
    }

    #[test]
    fn test_priority_first() {
        let tasks = plan(&["a", "b", "c", "d"], &[2, 0]).into_tasks(10);
        assert_eq!(queries(&tasks), vec!["c", "a", "b", "d"]);
        assert_eq!(tasks[0].id, 0);
        assert_eq!(tasks[0].rationale, "because c");
    }

    #[test]
    fn test_out_of_range_priority_ignored() {
        let tasks = plan(&["a", "b"], &[7, 1, 1]).into_tasks(10);
        assert_eq!(queries(&tasks), vec!["b", "a"]);
    }

    #[test]
    fn test_dedup_and_blank() {
        let tasks = plan(&["Rust", "  ", "rust ", "Go"], &[]).into_tasks(10);
        assert_eq!(queries(&tasks), vec!["Rust", "Go"]);
    }

    #[test]
    fn test_truncation_keeps_priority() {
        let tasks = plan(&["a", "b", "c", "d"], &[3]).into_tasks(2);
        assert_eq!(queries(&tasks), vec!["d", "a"]);
    }

    #[test]
    fn test_missing_optional_fields() {
        let parsed: SearchPlan =
            serde_json::from_str(r#"{"searches": [{"reason": "r", "query": "q"}]}"#)
                .unwrap_or_default();
        assert_eq!(parsed.into_tasks(5).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_tasks_bounded_and_unique(
            qs in proptest::collection::vec("[a-c]{0,2}", 0..30),
            max in 1usize..25,
        ) {
            let refs: Vec<&str> = qs.iter().map(String::as_str).collect();
            let tasks = plan(&refs, &[]).into_tasks(max);
            prop_assert!(tasks.len() <= max);
            let mut seen = HashSet::new();
            for (i, t) in tasks.iter().enumerate() {
                prop_assert_eq!(t.id, i);
                prop_assert!(!t.query.is_empty());
                prop_assert!(seen.insert(t.query.to_lowercase()));
            }
        }
    }
}
