//! Web search backends for the `web_search` capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Result snippet.
    pub description: String,
}

/// Backend that answers web queries.
#[async_trait]
pub trait WebSearchBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Runs `query`, returning at most `max_results` hits.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolExecution`] when the search fails.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, AgentError>;
}

/// DuckDuckGo search through `daedra`.
#[cfg(feature = "web-search")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDuckGo;

#[cfg(feature = "web-search")]
#[async_trait]
impl WebSearchBackend for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, AgentError> {
        let args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&args)
            .await
            .map_err(|e| AgentError::ToolExecution {
                name: "web_search".to_string(),
                message: format!("search failed: {e}"),
            })?;

        Ok(response
            .data
            .iter()
            .take(max_results)
            .map(|r| WebHit {
                title: r.title.clone(),
                url: r.url.clone(),
                description: r.description.clone(),
            })
            .collect())
    }
}

/// Stand-in used when the crate is built without `web-search`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl WebSearchBackend for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<WebHit>, AgentError> {
        Err(AgentError::CapabilityUnavailable {
            name: "web_search".to_string(),
        })
    }
}

/// The backend compiled into this build.
#[must_use]
pub fn default_backend() -> std::sync::Arc<dyn WebSearchBackend> {
    #[cfg(feature = "web-search")]
    {
        std::sync::Arc::new(DuckDuckGo)
    }
    #[cfg(not(feature = "web-search"))]
    {
        std::sync::Arc::new(Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_backend() {
        let result = Unavailable.search("rust", 3).await;
        assert!(matches!(
            result,
            Err(AgentError::CapabilityUnavailable { ref name }) if name == "web_search"
        ));
    }

    #[test]
    fn test_default_backend_name() {
        let backend = default_backend();
        #[cfg(feature = "web-search")]
        assert_eq!(backend.name(), "duckduckgo");
        #[cfg(not(feature = "web-search"))]
        assert_eq!(backend.name(), "unavailable");
    }
}
