//! Tool type definitions for function-calling.
//!
//! Provides provider-agnostic types for tool definitions, calls, and results.
//! Tools expose the search capabilities (`web_search`, `file_search`) to
//! agents whose [`AgentSpec`](super::spec::AgentSpec) grants them.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::spec::Capability;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match dispatch table in executor).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (JSON string on success, error message on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// A set of tool definitions scoped to an agent's capabilities.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Consumes the set, returning its definitions.
    #[must_use]
    pub fn into_definitions(self) -> Vec<ToolDefinition> {
        self.definitions
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Tool set for the given capabilities, in capability order.
    #[must_use]
    pub fn for_capabilities(capabilities: &[Capability]) -> Self {
        Self {
            definitions: capabilities
                .iter()
                .map(|c| match c {
                    Capability::WebSearch => def_web_search(),
                    Capability::FileSearch => def_file_search(),
                })
                .collect(),
        }
    }

    /// Empty tool set (no tools available).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Defines the `web_search` tool.
fn def_web_search() -> ToolDefinition {
    ToolDefinition {
        name: Capability::WebSearch.tool_name().to_string(),
        description: "Search the web. Returns a JSON array of results with title, url \
                       and description."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query text."
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return.",
                    "minimum": 1
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `file_search` tool.
fn def_file_search() -> ToolDefinition {
    ToolDefinition {
        name: Capability::FileSearch.tool_name().to_string(),
        description: "Search the user-supplied files. Returns a JSON array of the most \
                       relevant passages with their source path."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Terms to look for in the files."
                },
                "max_passages": {
                    "type": "integer",
                    "description": "Maximum number of passages to return.",
                    "minimum": 1
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}
