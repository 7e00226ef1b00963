//! Tool executor that dispatches capability tool calls.
//!
//! Maps tool names onto the web search backend and the file corpus. The
//! executor is cheap to clone and `Send`, so every concurrent search
//! dispatch gets its own handle.

use std::sync::Arc;

use serde::Deserialize;

use super::corpus::FileCorpus;
use super::tool::{ToolCall, ToolResult};
use super::websearch::WebSearchBackend;
use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;
/// Maximum query length accepted by either tool.
const MAX_TOOL_QUERY_LEN: usize = 1_000;
/// Hard cap on results/passages per call.
const MAX_RESULTS_PER_CALL: usize = 20;

#[derive(Deserialize)]
struct WebArgs {
    query: String,
    num_results: Option<usize>,
}

#[derive(Deserialize)]
struct FileArgs {
    query: String,
    max_passages: Option<usize>,
}

/// Executes tool calls against the session's search backends.
#[derive(Clone)]
pub struct ToolExecutor {
    web: Option<Arc<dyn WebSearchBackend>>,
    corpus: Option<Arc<FileCorpus>>,
    web_results: usize,
    file_passages: usize,
}

impl ToolExecutor {
    /// Creates an executor with no backends; every tool call fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            web: None,
            corpus: None,
            web_results: 8,
            file_passages: 6,
        }
    }

    /// Enables `web_search`.
    #[must_use]
    pub fn with_web(mut self, backend: Arc<dyn WebSearchBackend>, default_results: usize) -> Self {
        self.web = Some(backend);
        self.web_results = default_results.clamp(1, MAX_RESULTS_PER_CALL);
        self
    }

    /// Enables `file_search`.
    #[must_use]
    pub fn with_corpus(mut self, corpus: Arc<FileCorpus>, default_passages: usize) -> Self {
        self.corpus = Some(corpus);
        self.file_passages = default_passages.clamp(1, MAX_RESULTS_PER_CALL);
        self
    }

    /// Dispatches a tool call to the matching backend.
    ///
    /// Failures are returned as error results so the model can react to them.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
                is_error: true,
            };
        }

        let result = match call.name.as_str() {
            "web_search" => self.tool_web_search(&call.arguments).await,
            "file_search" => self.tool_file_search(&call.arguments),
            other => Err(AgentError::ToolExecution {
                name: other.to_string(),
                message: "unknown tool".to_string(),
            }),
        };

        match result {
            Ok(content) => ToolResult {
                tool_call_id: call.id.clone(),
                content,
                is_error: false,
            },
            Err(e) => ToolResult {
                tool_call_id: call.id.clone(),
                content: e.to_string(),
                is_error: true,
            },
        }
    }

    async fn tool_web_search(&self, args: &str) -> Result<String, AgentError> {
        let backend = self
            .web
            .as_ref()
            .ok_or_else(|| AgentError::CapabilityUnavailable {
                name: "web_search".to_string(),
            })?;
        let args: WebArgs = parse_args("web_search", args)?;
        let query = checked_query("web_search", &args.query)?;
        let limit = args
            .num_results
            .unwrap_or(self.web_results)
            .clamp(1, MAX_RESULTS_PER_CALL);

        let hits = backend.search(query, limit).await?;
        to_json("web_search", &hits)
    }

    fn tool_file_search(&self, args: &str) -> Result<String, AgentError> {
        let corpus = self
            .corpus
            .as_ref()
            .ok_or_else(|| AgentError::CapabilityUnavailable {
                name: "file_search".to_string(),
            })?;
        let args: FileArgs = parse_args("file_search", args)?;
        let query = checked_query("file_search", &args.query)?;
        let limit = args
            .max_passages
            .unwrap_or(self.file_passages)
            .clamp(1, MAX_RESULTS_PER_CALL);

        to_json("file_search", &corpus.search(query, limit))
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("web", &self.web.as_ref().map(|w| w.name()))
            .field("files", &self.corpus.as_ref().map(|c| c.len()))
            .finish_non_exhaustive()
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: &str) -> Result<T, AgentError> {
    serde_json::from_str(args).map_err(|e| AgentError::ToolExecution {
        name: tool.to_string(),
        message: format!("invalid arguments: {e}"),
    })
}

fn checked_query<'a>(tool: &str, query: &'a str) -> Result<&'a str, AgentError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AgentError::ToolExecution {
            name: tool.to_string(),
            message: "query is empty".to_string(),
        });
    }
    if query.len() > MAX_TOOL_QUERY_LEN {
        return Err(AgentError::ToolExecution {
            name: tool.to_string(),
            message: format!("query too long (max {MAX_TOOL_QUERY_LEN} bytes)"),
        });
    }
    Ok(query)
}

fn to_json<T: serde::Serialize>(tool: &str, value: &T) -> Result<String, AgentError> {
    serde_json::to_string(value).map_err(|e| AgentError::ToolExecution {
        name: tool.to_string(),
        message: format!("serialization failed: {e}"),
    })
}
