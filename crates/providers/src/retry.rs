//! Bounded retry with exponential backoff around a single provider.
//!
//! Transient failures (network, timeout, rate limit, 5xx) are retried up to
//! a fixed number of attempts; everything else is returned immediately.
//! Each attempt is bounded by its own timeout.

use async_trait::async_trait;
use remedy_core::error::ProviderError;
use remedy_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on a single backoff sleep, whatever the attempt number.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A provider that retries transient failures of an inner provider.
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    attempts: u32,
    base_delay: Duration,
    attempt_timeout: Duration,
}

impl RetryingProvider {
    /// Wrap `inner`, making at most `attempts` calls per request.
    pub fn new(inner: Arc<dyn Provider>, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before attempt `attempt + 1` (1-based `attempt`).
    ///
    /// Rate limits honour the server's hint when it is longer than the
    /// computed backoff.
    fn backoff(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let delay = match error {
            ProviderError::RateLimited { retry_after_secs } => {
                exp.max(Duration::from_secs(*retry_after_secs))
            }
            _ => exp,
        };
        delay.min(MAX_BACKOFF)
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(
                self.attempt_timeout,
                self.inner.complete(request.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    self.inner.name(),
                    self.attempt_timeout.as_secs()
                ))),
            };

            let error = match result {
                Ok(response) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Retry succeeded");
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= self.attempts {
                return Err(error);
            }

            let delay = self.backoff(attempt, &error);
            warn!(
                provider = %self.inner.name(),
                attempt,
                max_attempts = self.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient provider failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_core::message::Message;
    use std::sync::Mutex;

    /// Fails with the scripted errors in order, then succeeds.
    struct FlakyProvider {
        errors: Mutex<Vec<ProviderError>>,
        call_count: Mutex<u32>,
    }

    impl FlakyProvider {
        fn new(errors: Vec<ProviderError>) -> Self {
            Self {
                errors: Mutex::new(errors),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            let mut errors = self.errors.lock().unwrap();
            if errors.is_empty() {
                Ok(ProviderResponse {
                    message: Message::assistant("success"),
                    usage: None,
                    model: "test-model".into(),
                })
            } else {
                Err(errors.remove(0))
            }
        }
    }

    /// A provider that hangs forever (for timeout testing).
    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::Timeout("never".into()))
        }
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest {
            model: "test".into(),
            messages: vec![Message::user("hello")],
            temperature: 0.2,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let inner = Arc::new(FlakyProvider::new(vec![
            ProviderError::Network("reset".into()),
            ProviderError::ApiError {
                status_code: 503,
                message: "overloaded".into(),
            },
        ]));
        let provider = RetryingProvider::new(inner.clone(), 3);

        let response = provider.complete(test_request()).await.unwrap();
        assert_eq!(response.message.content, "success");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(FlakyProvider::new(vec![
            ProviderError::Network("a".into()),
            ProviderError::Network("b".into()),
            ProviderError::Network("c".into()),
        ]));
        let provider = RetryingProvider::new(inner.clone(), 2);

        let err = provider.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(ref m) if m == "b"));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let inner = Arc::new(FlakyProvider::new(vec![ProviderError::AuthenticationFailed(
            "bad key".into(),
        )]));
        let provider = RetryingProvider::new(inner.clone(), 5);

        assert!(provider.complete(test_request()).await.is_err());
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempt_times_out() {
        let provider = RetryingProvider::new(Arc::new(HangingProvider), 1)
            .with_attempt_timeout(Duration::from_millis(50));

        let err = provider.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let provider = RetryingProvider::new(Arc::new(HangingProvider), 10)
            .with_base_delay(Duration::from_millis(100));
        let net = ProviderError::Network("x".into());
        assert_eq!(provider.backoff(1, &net), Duration::from_millis(100));
        assert_eq!(provider.backoff(3, &net), Duration::from_millis(400));
        assert_eq!(provider.backoff(20, &net), MAX_BACKOFF);

        let limited = ProviderError::RateLimited { retry_after_secs: 7 };
        assert_eq!(provider.backoff(1, &limited), Duration::from_secs(7));
    }
}
