//! Agentic tool-calling loop.
//!
//! Drives the LLM ↔ tool execution round-trip: sends a request to the model,
//! executes any tool calls in the response, appends results, and repeats
//! until the model produces a final text response or the iteration limit
//! is reached.

use tracing::debug;

use super::executor::ToolExecutor;
use super::message::{
    ChatRequest, ChatResponse, TokenUsage, assistant_tool_calls_message, tool_message,
};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Tool activity observed during one agentic loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolStats {
    /// Tool calls the model made.
    pub calls: usize,
    /// Calls whose execution returned a non-error result.
    pub succeeded: usize,
}

/// Runs an agentic loop: model → tool calls → tool results → model → …
///
/// Continues until the model responds without tool calls (i.e., it produces
/// a final text answer) or `max_iterations` is reached.
///
/// # Arguments
///
/// * `provider` - LLM provider to call.
/// * `request` - Initial chat request (mutated in-place with tool messages).
/// * `executor` - Dispatches tool calls to the search backends.
/// * `max_iterations` - Safety limit on round-trips.
///
/// A forced tool choice (`request.require_tool`) applies to the first
/// round only; once tool results are in the conversation the model is free
/// to answer.
///
/// # Returns
///
/// The final [`ChatResponse`], with `usage` summed over every round-trip,
/// and the [`ToolStats`] for the loop.
///
/// # Errors
///
/// Returns [`AgentError::ToolLoopExceeded`] if the model keeps requesting
/// tools beyond `max_iterations`. Propagates any provider errors.
pub async fn agentic_loop(
    provider: &dyn LlmProvider,
    request: &mut ChatRequest,
    executor: &ToolExecutor,
    max_iterations: usize,
) -> Result<(ChatResponse, ToolStats), AgentError> {
    let mut usage = TokenUsage::default();
    let mut stats = ToolStats::default();

    for iteration in 0..max_iterations {
        let mut response = provider.chat(request).await?;
        usage.accumulate(&response.usage);

        // If no tool calls, we have a final answer
        if response.tool_calls.is_empty() {
            debug!(
                agent = %request.agent,
                iteration,
                "agentic loop completed with final text response"
            );
            response.usage = usage;
            return Ok((response, stats));
        }

        debug!(
            agent = %request.agent,
            iteration,
            tool_count = response.tool_calls.len(),
            "executing tool calls"
        );

        request
            .messages
            .push(assistant_tool_calls_message(response.tool_calls.clone()));

        for call in &response.tool_calls {
            let result = executor.execute(call).await;
            stats.calls += 1;
            if !result.is_error {
                stats.succeeded += 1;
            }
            debug!(
                tool = call.name,
                call_id = call.id,
                is_error = result.is_error,
                "tool execution complete"
            );
            request
                .messages
                .push(tool_message(&result.tool_call_id, &result.content));
        }
        request.require_tool = false;
    }

    Err(AgentError::ToolLoopExceeded { max_iterations })
}
