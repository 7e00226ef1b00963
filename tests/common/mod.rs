//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use research_rs::agent::message::{ChatRequest, ChatResponse, Role, TokenUsage};
use research_rs::agent::websearch::{WebHit, WebSearchBackend};
use research_rs::agent::{LlmProvider, Orchestrator, PromptSet, ResearchConfig, ToolCall};
use research_rs::error::AgentError;

/// Tokens reported by every mock completion.
pub const TOKENS_PER_CALL: u32 = 10;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// One recorded completion call.
#[derive(Debug, Clone)]
pub struct Call {
    /// Agent name from the request.
    pub agent: String,
    /// System prompt.
    pub system: String,
    /// Last user message.
    pub input: String,
}

/// Completion backend scripted per agent name.
///
/// Each agent has a queue of replies consumed in order; once the queue is
/// empty the agent's fallback reply (if any) is used. A request that must
/// call a tool first gets a tool call to its first tool; those rounds are
/// counted by [`MockProvider::total_calls`] only.
#[derive(Default)]
pub struct MockProvider {
    queues: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallbacks: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<Call>>,
    tool_rounds: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one reply for `agent`.
    pub fn reply(self, agent: &str, content: impl Into<String>) -> Self {
        self.push(agent, Reply::Text(content.into()));
        self
    }

    /// Queues one failure for `agent`.
    pub fn fail(self, agent: &str, message: &str) -> Self {
        self.push(agent, Reply::Fail(message.to_string()));
        self
    }

    /// Reply used for `agent` once its queue is empty.
    pub fn always(self, agent: &str, content: impl Into<String>) -> Self {
        if let Ok(mut f) = self.fallbacks.lock() {
            f.insert(agent.to_string(), Reply::Text(content.into()));
        }
        self
    }

    /// Failure used for `agent` once its queue is empty.
    pub fn always_fail(self, agent: &str, message: &str) -> Self {
        if let Ok(mut f) = self.fallbacks.lock() {
            f.insert(agent.to_string(), Reply::Fail(message.to_string()));
        }
        self
    }

    fn push(&self, agent: &str, reply: Reply) {
        if let Ok(mut q) = self.queues.lock() {
            q.entry(agent.to_string()).or_default().push_back(reply);
        }
    }

    /// Calls made to `agent`.
    pub fn calls(&self, agent: &str) -> Vec<Call> {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|c| c.agent == agent).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of calls made to `agent`.
    pub fn count(&self, agent: &str) -> usize {
        self.calls(agent).len()
    }

    /// Total number of calls, tool rounds included.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
            + self.tool_rounds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let has_tool_output = request.messages.iter().any(|m| m.role == Role::Tool);
        if let (true, false, Some(tool)) =
            (request.require_tool, has_tool_output, request.tools.first())
        {
            let round = self.tool_rounds.fetch_add(1, Ordering::SeqCst);
            return Ok(ChatResponse {
                content: String::new(),
                usage: usage(),
                tool_calls: vec![ToolCall {
                    id: format!("call_{round}"),
                    name: tool.name.clone(),
                    arguments: r#"{"query":"evidence"}"#.to_string(),
                }],
                finish_reason: Some("tool_calls".to_string()),
            });
        }

        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let input = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                agent: request.agent.clone(),
                system,
                input,
            });
        }

        let queued = self
            .queues
            .lock()
            .ok()
            .and_then(|mut q| q.get_mut(&request.agent).and_then(VecDeque::pop_front));
        let reply = queued.or_else(|| {
            self.fallbacks
                .lock()
                .ok()
                .and_then(|f| f.get(&request.agent).cloned())
        });

        match reply {
            Some(Reply::Text(content)) => Ok(ChatResponse {
                content,
                usage: usage(),
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            }),
            Some(Reply::Fail(message)) => Err(AgentError::ApiRequest {
                message,
                status: Some(400),
            }),
            None => Err(AgentError::ApiRequest {
                message: format!("no scripted reply for agent '{}'", request.agent),
                status: Some(400),
            }),
        }
    }
}

const fn usage() -> TokenUsage {
    TokenUsage {
        prompt_tokens: TOKENS_PER_CALL / 2,
        completion_tokens: TOKENS_PER_CALL / 2,
        total_tokens: TOKENS_PER_CALL,
    }
}

/// Web backend returning one fixed hit per query.
pub struct StaticWeb;

#[async_trait]
impl WebSearchBackend for StaticWeb {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<WebHit>, AgentError> {
        Ok(vec![WebHit {
            title: format!("About {query}"),
            url: "https://example.org/article".to_string(),
            description: "Background material.".to_string(),
        }])
    }
}

pub fn route(category: &str) -> String {
    format!(r#"{{"category": "{category}"}}"#)
}

pub fn plan(queries: &[&str]) -> String {
    let searches: Vec<serde_json::Value> = queries
        .iter()
        .map(|q| serde_json::json!({"reason": format!("covers {q}"), "query": q}))
        .collect();
    serde_json::json!({
        "searches": searches,
        "priority_searches": [],
        "areas_covered": ["background"]
    })
    .to_string()
}

pub fn draft(summary: &str) -> String {
    serde_json::json!({
        "short_summary": summary,
        "markdown_report": format!("# Report\n\n{summary} body."),
        "follow_up_questions": ["What next?"],
        "key_insights": ["An insight."]
    })
    .to_string()
}

pub fn quality(score: f64) -> String {
    serde_json::json!({
        "score": score,
        "feedback": format!("quality feedback at {score}"),
        "improvements": ["add more citations"],
        "additional_queries": []
    })
    .to_string()
}

pub fn standards(score: f64) -> String {
    serde_json::json!({
        "overall_score": score,
        "summary_feedback": format!("standards feedback at {score}"),
        "improvement_suggestions": ["tighten structure"],
        "meets_standards": score >= 8.5
    })
    .to_string()
}

/// A provider that answers every role with passing defaults.
pub fn happy_provider() -> MockProvider {
    MockProvider::new()
        .always("router", route("technical"))
        .always("planner", plan(&["alpha", "beta", "gamma"]))
        .always("web_searcher", "Web findings with a source https://example.org.")
        .always("file_searcher", "File findings from notes.md.")
        .always("writer", draft("Initial"))
        .always("reviser", draft("Revised"))
        .always("quality_evaluator", quality(9.0))
        .always("standards_evaluator", standards(9.0))
}

pub fn config() -> ResearchConfig {
    ResearchConfig::builder()
        .api_key("test-key")
        .max_retries(0)
        .max_concurrency(4)
        .build()
        .unwrap_or_else(|e| panic!("config: {e}"))
}

pub fn orchestrator(provider: Arc<MockProvider>) -> Orchestrator {
    Orchestrator::new(provider, config())
        .with_prompts(PromptSet::defaults())
        .with_web_backend(Arc::new(StaticWeb))
}
