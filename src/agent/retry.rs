//! Timeout and retry policy around a completion provider.
//!
//! Every call is bounded by the configured call timeout. Transient failures
//! (network, timeout, rate limit, server error) are retried with exponential
//! backoff; schema and permanent failures are returned immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::message::{ChatRequest, ChatResponse};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Upper bound on a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry policy for completion calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Timeout applied to each attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

/// Provider wrapper applying [`RetryPolicy`].
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        match tokio::time::timeout(self.policy.call_timeout, self.inner.chat(request)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout {
                elapsed: self.policy.call_timeout,
            }),
        }
    }
}

impl std::fmt::Debug for RetryingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingProvider")
            .field("inner", &self.inner.name())
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        agent = %request.agent,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying completion call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::agent::message::{TokenUsage, user_message};

    /// Fails with `error` for the first `failures` calls, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> AgentError,
        hang: bool,
    }

    #[async_trait]
    impl LlmProvider for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if n < self.failures {
                return Err((self.error)());
            }
            Ok(ChatResponse {
                content: "ok".to_string(),
                usage: TokenUsage::default(),
                tool_calls: Vec::new(),
                finish_reason: None,
            })
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            agent: "test".to_string(),
            model: "m".to_string(),
            messages: vec![user_message("hi")],
            temperature: None,
            max_tokens: None,
            json_mode: false,
            tools: Vec::new(),
            require_tool: false,
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
        }
    }

    fn flaky(failures: u32, error: fn() -> AgentError) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures,
            calls: AtomicU32::new(0),
            error,
            hang: false,
        })
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let p = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(1),
        };
        assert_eq!(p.delay_for(0), Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
        assert_eq!(p.delay_for(20), MAX_DELAY);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let inner = flaky(2, || AgentError::Transport {
            message: "reset".into(),
        });
        let provider = RetryingProvider::new(inner.clone(), policy(2));
        let response = provider.chat(&request()).await;
        assert!(response.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let inner = flaky(5, || AgentError::ApiRequest {
            message: "overloaded".into(),
            status: Some(503),
        });
        let provider = RetryingProvider::new(inner.clone(), policy(1));
        let response = provider.chat(&request()).await;
        assert!(response.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_fast() {
        let inner = flaky(5, || AgentError::ApiRequest {
            message: "invalid api key".into(),
            status: Some(401),
        });
        let provider = RetryingProvider::new(inner.clone(), policy(3));
        assert!(provider.chat(&request()).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let inner = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            error: || AgentError::ApiKeyMissing,
            hang: true,
        });
        let provider = RetryingProvider::new(
            inner.clone(),
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(10),
                call_timeout: Duration::from_secs(2),
            },
        );
        let result = provider.chat(&request()).await;
        assert!(matches!(result, Err(AgentError::Timeout { .. })));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
