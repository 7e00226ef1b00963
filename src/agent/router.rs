//! Router agent.
//!
//! Classifies the query into a [`ResearchCategory`]. An answer outside the
//! fixed set falls back to the configured default instead of failing.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use super::executor::ToolExecutor;
use super::invoke::{AgentResponse, invoke, parse_structured};
use super::prompt::build_router_prompt;
use super::provider::LlmProvider;
use super::spec::AgentSpec;
use crate::core::ResearchCategory;
use crate::error::AgentError;

/// Structured router answer.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RouteDecision {
    /// One of `scientific`, `technical`, `humanities`, `interdisciplinary`.
    pub category: String,
}

/// Outcome of routing.
#[derive(Debug, Clone)]
pub struct Routed {
    /// Selected category.
    pub category: ResearchCategory,
    /// Whether the fallback category was used.
    pub fell_back: bool,
    /// Raw agent response.
    pub response: AgentResponse,
}

/// Agent that picks the research category.
#[derive(Debug, Clone)]
pub struct RouterAgent {
    spec: AgentSpec,
    fallback: ResearchCategory,
}

impl RouterAgent {
    /// Creates a router from its spec and fallback category.
    #[must_use]
    pub const fn new(spec: AgentSpec, fallback: ResearchCategory) -> Self {
        Self { spec, fallback }
    }

    /// Classifies `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only when the completion call itself fails;
    /// unusable answers fall back to the default category.
    pub async fn route(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
    ) -> Result<Routed, AgentError> {
        let response = invoke(
            &self.spec,
            provider,
            &ToolExecutor::new(),
            &build_router_prompt(query),
        )
        .await?;

        let (category, fell_back) = match Self::parse_category(&response.content) {
            Some(category) => (category, false),
            None => {
                warn!(
                    answer = %response.content.chars().take(80).collect::<String>(),
                    fallback = %self.fallback,
                    "router answer not recognised, using fallback category"
                );
                (self.fallback, true)
            }
        };

        Ok(Routed {
            category,
            fell_back,
            response,
        })
    }

    /// Reads a category from a JSON answer or a bare label.
    fn parse_category(content: &str) -> Option<ResearchCategory> {
        parse_structured::<RouteDecision>("RouteDecision", content)
            .ok()
            .and_then(|d| ResearchCategory::parse(&d.category))
            .or_else(|| ResearchCategory::parse(content))
    }
}
