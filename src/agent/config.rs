//! Research configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::ResearchCategory;
use crate::error::AgentError;

/// Default maximum concurrent search dispatches.
const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Default upper bound on planned searches.
const DEFAULT_MAX_SEARCHES: usize = 20;
/// Default minimum successful dispatches for a usable search round.
const DEFAULT_MIN_SUCCESSFUL_SEARCHES: usize = 1;
/// Default writer (synthesizer/reviser) max tokens. Reports run long.
const DEFAULT_WRITER_MAX_TOKENS: u32 = 16384;
/// Default evaluator max tokens.
const DEFAULT_EVALUATOR_MAX_TOKENS: u32 = 4096;
/// Default search agent max tokens.
const DEFAULT_SEARCH_MAX_TOKENS: u32 = 2048;
/// Default router/planner max tokens.
const DEFAULT_PLANNER_MAX_TOKENS: u32 = 2048;
/// Default per-call timeout in seconds.
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
/// Default per-search-dispatch timeout in seconds.
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 180;
/// Default max retries for transient errors.
const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default base delay for retry backoff in milliseconds.
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
/// Default maximum tool-calling loop iterations.
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 6;
/// Default web results per `web_search` call.
const DEFAULT_WEB_RESULTS: usize = 8;
/// Default passages per `file_search` call.
const DEFAULT_FILE_PASSAGES: usize = 6;

/// Configuration for the research pipeline.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for the router agent.
    pub router_model: String,
    /// Model for the planner agent.
    pub planner_model: String,
    /// Model for web and file search agents.
    pub search_model: String,
    /// Model for the synthesizer and reviser.
    pub writer_model: String,
    /// Model for evaluators.
    pub evaluator_model: String,
    /// Maximum concurrent search dispatches.
    pub max_concurrency: usize,
    /// Upper bound on planned searches.
    pub max_searches: usize,
    /// Minimum successful dispatches for a search round to be usable.
    pub min_successful_searches: usize,
    /// Maximum tokens for router and planner responses.
    pub planner_max_tokens: u32,
    /// Maximum tokens for search agent responses.
    pub search_max_tokens: u32,
    /// Maximum tokens for writer responses.
    pub writer_max_tokens: u32,
    /// Maximum tokens for evaluator responses.
    pub evaluator_max_tokens: u32,
    /// Timeout for a single completion call.
    pub call_timeout: Duration,
    /// Timeout for one search dispatch, including its tool loop.
    pub search_timeout: Duration,
    /// Maximum retry attempts per completion call for transient errors.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff.
    pub retry_base_delay: Duration,
    /// Maximum tool-calling loop iterations before aborting.
    pub max_tool_iterations: usize,
    /// Web results returned per `web_search` tool call.
    pub web_results: usize,
    /// Passages returned per `file_search` tool call.
    pub file_passages: usize,
    /// Category used when the router's answer is not recognised.
    pub default_category: ResearchCategory,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing
    /// files.
    pub prompt_dir: Option<PathBuf>,
    /// Minimum delay between search dispatches per task.
    ///
    /// Applied after acquiring the concurrency semaphore permit.
    /// `Duration::ZERO` (default) disables rate limiting beyond what
    /// the semaphore provides.
    pub request_delay: Duration,
}

impl ResearchConfig {
    /// Creates a new builder for `ResearchConfig`.
    #[must_use]
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`ResearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResearchConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    router_model: Option<String>,
    planner_model: Option<String>,
    search_model: Option<String>,
    writer_model: Option<String>,
    evaluator_model: Option<String>,
    max_concurrency: Option<usize>,
    max_searches: Option<usize>,
    min_successful_searches: Option<usize>,
    writer_max_tokens: Option<u32>,
    evaluator_max_tokens: Option<u32>,
    call_timeout: Option<Duration>,
    search_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    max_tool_iterations: Option<usize>,
    default_category: Option<ResearchCategory>,
    prompt_dir: Option<PathBuf>,
    request_delay: Option<Duration>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ResearchConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RESEARCH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RESEARCH_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RESEARCH_BASE_URL"))
                .ok();
        }
        if self.router_model.is_none() {
            self.router_model = std::env::var("RESEARCH_ROUTER_MODEL").ok();
        }
        if self.planner_model.is_none() {
            self.planner_model = std::env::var("RESEARCH_PLANNER_MODEL").ok();
        }
        if self.search_model.is_none() {
            self.search_model = std::env::var("RESEARCH_SEARCH_MODEL").ok();
        }
        if self.writer_model.is_none() {
            self.writer_model = std::env::var("RESEARCH_WRITER_MODEL").ok();
        }
        if self.evaluator_model.is_none() {
            self.evaluator_model = std::env::var("RESEARCH_EVALUATOR_MODEL").ok();
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parse("RESEARCH_MAX_CONCURRENCY");
        }
        if self.max_searches.is_none() {
            self.max_searches = env_parse("RESEARCH_MAX_SEARCHES");
        }
        if self.min_successful_searches.is_none() {
            self.min_successful_searches = env_parse("RESEARCH_MIN_SUCCESSFUL_SEARCHES");
        }
        if self.call_timeout.is_none() {
            self.call_timeout =
                env_parse::<u64>("RESEARCH_CALL_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.search_timeout.is_none() {
            self.search_timeout =
                env_parse::<u64>("RESEARCH_SEARCH_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.max_retries.is_none() {
            self.max_retries = env_parse("RESEARCH_MAX_RETRIES");
        }
        if self.default_category.is_none() {
            self.default_category = std::env::var("RESEARCH_DEFAULT_CATEGORY")
                .ok()
                .and_then(|v| ResearchCategory::parse(&v));
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RESEARCH_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the router model.
    #[must_use]
    pub fn router_model(mut self, model: impl Into<String>) -> Self {
        self.router_model = Some(model.into());
        self
    }

    /// Sets the planner model.
    #[must_use]
    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    /// Sets the search agent model.
    #[must_use]
    pub fn search_model(mut self, model: impl Into<String>) -> Self {
        self.search_model = Some(model.into());
        self
    }

    /// Sets the writer model.
    #[must_use]
    pub fn writer_model(mut self, model: impl Into<String>) -> Self {
        self.writer_model = Some(model.into());
        self
    }

    /// Sets the evaluator model.
    #[must_use]
    pub fn evaluator_model(mut self, model: impl Into<String>) -> Self {
        self.evaluator_model = Some(model.into());
        self
    }

    /// Sets the maximum search concurrency.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the upper bound on planned searches.
    #[must_use]
    pub const fn max_searches(mut self, n: usize) -> Self {
        self.max_searches = Some(n);
        self
    }

    /// Sets the minimum successful dispatches for a usable round.
    #[must_use]
    pub const fn min_successful_searches(mut self, n: usize) -> Self {
        self.min_successful_searches = Some(n);
        self
    }

    /// Sets the writer max tokens.
    #[must_use]
    pub const fn writer_max_tokens(mut self, n: u32) -> Self {
        self.writer_max_tokens = Some(n);
        self
    }

    /// Sets the evaluator max tokens.
    #[must_use]
    pub const fn evaluator_max_tokens(mut self, n: u32) -> Self {
        self.evaluator_max_tokens = Some(n);
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn call_timeout(mut self, duration: Duration) -> Self {
        self.call_timeout = Some(duration);
        self
    }

    /// Sets the per-search-dispatch timeout.
    #[must_use]
    pub const fn search_timeout(mut self, duration: Duration) -> Self {
        self.search_timeout = Some(duration);
        self
    }

    /// Sets the max retries.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the retry backoff base delay.
    #[must_use]
    pub const fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Sets the maximum tool-calling loop iterations.
    #[must_use]
    pub const fn max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = Some(n);
        self
    }

    /// Sets the router fallback category.
    #[must_use]
    pub const fn default_category(mut self, category: ResearchCategory) -> Self {
        self.default_category = Some(category);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the minimum delay between search dispatches.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Builds the [`ResearchConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<ResearchConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        Ok(ResearchConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            router_model: self
                .router_model
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            planner_model: self.planner_model.unwrap_or_else(|| "gpt-4o".to_string()),
            search_model: self
                .search_model
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            writer_model: self.writer_model.unwrap_or_else(|| "gpt-4o".to_string()),
            evaluator_model: self
                .evaluator_model
                .unwrap_or_else(|| "gpt-4o".to_string()),
            max_concurrency: self
                .max_concurrency
                .unwrap_or(DEFAULT_MAX_CONCURRENCY)
                .max(1),
            max_searches: self.max_searches.unwrap_or(DEFAULT_MAX_SEARCHES).max(1),
            min_successful_searches: self
                .min_successful_searches
                .unwrap_or(DEFAULT_MIN_SUCCESSFUL_SEARCHES)
                .max(1),
            planner_max_tokens: DEFAULT_PLANNER_MAX_TOKENS,
            search_max_tokens: DEFAULT_SEARCH_MAX_TOKENS,
            writer_max_tokens: self.writer_max_tokens.unwrap_or(DEFAULT_WRITER_MAX_TOKENS),
            evaluator_max_tokens: self
                .evaluator_max_tokens
                .unwrap_or(DEFAULT_EVALUATOR_MAX_TOKENS),
            call_timeout: self
                .call_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS)),
            search_timeout: self
                .search_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_base_delay: self
                .retry_base_delay
                .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS)),
            max_tool_iterations: self
                .max_tool_iterations
                .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS)
                .max(1),
            web_results: DEFAULT_WEB_RESULTS,
            file_passages: DEFAULT_FILE_PASSAGES,
            default_category: self.default_category.unwrap_or_default(),
            prompt_dir: self.prompt_dir,
            request_delay: self.request_delay.unwrap_or(Duration::ZERO),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ResearchConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.max_searches, DEFAULT_MAX_SEARCHES);
        assert_eq!(config.min_successful_searches, 1);
        assert_eq!(config.default_category, ResearchCategory::Interdisciplinary);
        assert_eq!(config.writer_model, "gpt-4o");
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = ResearchConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ResearchConfig::builder()
            .api_key("key")
            .provider("custom")
            .writer_model("o3-mini")
            .max_concurrency(3)
            .max_searches(5)
            .default_category(ResearchCategory::Technical)
            .call_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.writer_model, "o3-mini");
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.max_searches, 5);
        assert_eq!(config.default_category, ResearchCategory::Technical);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_limits_are_raised_to_one() {
        let config = ResearchConfig::builder()
            .api_key("key")
            .max_concurrency(0)
            .min_successful_searches(0)
            .max_tool_iterations(0)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.min_successful_searches, 1);
        assert_eq!(config.max_tool_iterations, 1);
    }
}
