//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations and
//! wraps them with the configured retry and timeout policy.

use std::sync::Arc;

use crate::agent::config::ResearchConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::agent::retry::{RetryPolicy, RetryingProvider};
use crate::error::AgentError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default): OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &ResearchConfig) -> Result<Arc<dyn LlmProvider>, AgentError> {
    let base: Arc<dyn LlmProvider> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiProvider::new(config)),
        other => {
            return Err(AgentError::UnsupportedProvider {
                name: other.to_string(),
            });
        }
    };
    Ok(with_retry(base, config))
}

/// Wraps `provider` with the retry policy from `config`.
#[must_use]
pub fn with_retry(provider: Arc<dyn LlmProvider>, config: &ResearchConfig) -> Arc<dyn LlmProvider> {
    Arc::new(RetryingProvider::new(
        provider,
        RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            call_timeout: config.call_timeout,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_openai_provider() {
        let config = ResearchConfig::builder()
            .api_key("test")
            .provider("openai")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap_or_else(|_| unreachable!()).name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = ResearchConfig::builder()
            .api_key("test")
            .provider("unknown")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = create_provider(&config);
        assert!(matches!(
            result,
            Err(AgentError::UnsupportedProvider { ref name }) if name == "unknown"
        ));
    }
}
