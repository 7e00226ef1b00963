//! Generic agent invocation.
//!
//! [`invoke`] runs any [`AgentSpec`] against a provider: it builds the chat
//! request, exposes the agent's capabilities as tools, drives the tool loop
//! and returns the final answer. [`invoke_structured`] additionally parses
//! the answer into the agent's structured contract.

use serde::de::DeserializeOwned;
use tracing::debug;

use super::agentic_loop::{ToolStats, agentic_loop};
use super::executor::ToolExecutor;
use super::message::{ChatRequest, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use super::spec::{AgentSpec, OutputContract};
use super::tool::ToolSet;
use crate::error::AgentError;

/// Response from an agent invocation.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's final text output.
    pub content: String,
    /// Token usage summed over the invocation.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
    /// Tool calls made while producing the answer.
    pub tools: ToolStats,
}

/// Invokes `spec` with `input` as the user message.
///
/// # Errors
///
/// Returns [`AgentError`] on completion failures or when the tool loop
/// exceeds the agent's limit.
pub async fn invoke(
    spec: &AgentSpec,
    provider: &dyn LlmProvider,
    executor: &ToolExecutor,
    input: &str,
) -> Result<AgentResponse, AgentError> {
    let tools = ToolSet::for_capabilities(&spec.capabilities).into_definitions();
    let mut request = ChatRequest {
        agent: spec.name.clone(),
        model: spec.model.clone(),
        messages: vec![
            system_message(&system_prompt(spec)),
            user_message(input),
        ],
        temperature: Some(spec.temperature),
        max_tokens: Some(spec.max_tokens),
        json_mode: spec.output.is_structured(),
        require_tool: spec.require_tool_use && !tools.is_empty(),
        tools,
    };

    debug!(
        agent = %spec.name,
        model = %spec.model,
        tools = request.tools.len(),
        "invoking agent"
    );

    let (response, tools) = agentic_loop(
        provider,
        &mut request,
        executor,
        spec.max_tool_iterations.max(1),
    )
    .await?;

    Ok(AgentResponse {
        content: response.content,
        usage: response.usage,
        finish_reason: response.finish_reason,
        tools,
    })
}

/// Invokes `spec` and parses its answer as `T`.
///
/// The raw response is returned alongside so callers can account for usage.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] when the answer does not match
/// `T`, or any error from [`invoke`].
pub async fn invoke_structured<T: DeserializeOwned>(
    spec: &AgentSpec,
    provider: &dyn LlmProvider,
    executor: &ToolExecutor,
    input: &str,
) -> Result<(T, AgentResponse), AgentError> {
    let response = invoke(spec, provider, executor, input).await?;
    let name = match &spec.output {
        OutputContract::Structured { schema_name, .. } => schema_name.as_str(),
        OutputContract::Text => spec.name.as_str(),
    };
    let value = parse_structured(name, &response.content)?;
    Ok((value, response))
}

/// Parses a JSON answer, tolerating markdown code fences and surrounding prose.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] if no JSON object matching `T`
/// can be extracted.
pub fn parse_structured<T: DeserializeOwned>(name: &str, content: &str) -> Result<T, AgentError> {
    let json_str = extract_json(content);
    serde_json::from_str::<T>(json_str).map_err(|e| AgentError::ResponseParse {
        message: format!("Failed to parse {name}: {e}"),
        content: content.to_string(),
    })
}

fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    // Handle markdown code blocks
    let unfenced = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    if unfenced.starts_with('{') {
        return unfenced;
    }
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

fn system_prompt(spec: &AgentSpec) -> String {
    match &spec.output {
        OutputContract::Text => spec.instructions.clone(),
        OutputContract::Structured {
            schema_name,
            schema,
        } => format!(
            "{}\n\n## Output Format\n\nRespond with a single JSON object ({schema_name}) matching \
             this JSON Schema. Return ONLY the JSON object, no surrounding text.\n\n```json\n{}\n```",
            spec.instructions,
            serde_json::to_string_pretty(schema).unwrap_or_default()
        ),
    }
}
