//! Retry policy applied around provider calls.
//!
//! Exponential backoff with jitter between attempts; the timeout bounds
//! each attempt individually, not the whole call.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use promptcheck_core::{CostSource, ProviderResponse};

use crate::client::{CompletionRequest, ProviderClient};
use crate::error::{ProviderError, ProviderFailure};
use crate::pricing;

/// Explicit, composable retry policy. Retry eligibility itself comes from
/// [`ProviderError::is_retryable`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Uniform jitter fraction added on top of the exponential delay.
    pub backoff_jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(10),
            backoff_jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `retry_attempts` additional attempts after the
    /// first failure.
    pub fn with_retry_attempts(retry_attempts: u32) -> Self {
        Self {
            max_attempts: retry_attempts + 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `completed_attempts` failures.
    fn backoff_delay(&self, completed_attempts: u32) -> Duration {
        let exponent = completed_attempts.saturating_sub(1).min(16);
        let base = self
            .backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_cap);
        let jitter = rand::thread_rng().gen_range(0.0..=self.backoff_jitter);
        base.mul_f64(1.0 + jitter)
    }
}

/// Call a provider under the retry policy, normalizing the outcome.
///
/// On success, `latency_ms` spans from the first attempt start to the
/// final success and `raw_attempts` counts every attempt consumed. On
/// terminal failure the last observed cause plus the attempt count come
/// back as a [`ProviderFailure`].
pub async fn complete_with_retry(
    client: &dyn ProviderClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
    attempt_timeout: Duration,
) -> Result<ProviderResponse, ProviderFailure> {
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let outcome = match tokio::time::timeout(attempt_timeout, client.complete(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::Timeout {
                seconds: attempt_timeout.as_secs_f64(),
            }),
        };

        match outcome {
            Ok(completion) => {
                let (cost, cost_source) = match completion.provider_cost {
                    Some(cost) => (cost, CostSource::Provider),
                    None => match pricing::estimate(
                        client.name(),
                        &request.model,
                        completion.tokens_prompt,
                        completion.tokens_completion,
                    ) {
                        Some(cost) => (cost, CostSource::PriceTable),
                        None => (0.0, CostSource::Unavailable),
                    },
                };
                debug!(
                    provider = client.name(),
                    model = %request.model,
                    attempts = attempt,
                    "completion succeeded"
                );
                return Ok(ProviderResponse {
                    text: completion.text,
                    tokens_prompt: completion.tokens_prompt,
                    tokens_completion: completion.tokens_completion,
                    latency_ms: started.elapsed().as_millis() as u64,
                    cost,
                    cost_source,
                    raw_attempts: attempt,
                    model_name: request.model.clone(),
                });
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    provider = client.name(),
                    model = %request.model,
                    attempt,
                    kind = error.kind(),
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                warn!(
                    provider = client.name(),
                    model = %request.model,
                    attempts = attempt,
                    kind = error.kind(),
                    "provider call terminally failed"
                );
                return Err(ProviderFailure {
                    error,
                    attempts: attempt,
                });
            }
        }
    }

    unreachable!("retry loop returns on the last attempt")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::client::CompletionAttempt;

    use super::*;

    enum StubBehavior {
        /// Fail with a rate limit this many times, then succeed.
        RateLimitedUntil(u32),
        AlwaysRateLimited,
        AuthFailure,
        FatalFailure,
        HangForever,
    }

    struct StubProvider {
        behavior: StubBehavior,
        calls: AtomicU32,
    }

    impl StubProvider {
        fn new(behavior: StubBehavior) -> Self {
            Self {
                behavior,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderClient for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionAttempt, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.behavior {
                StubBehavior::RateLimitedUntil(failures) if call <= failures => {
                    Err(ProviderError::RateLimit("slow down".into()))
                }
                StubBehavior::RateLimitedUntil(_) => Ok(CompletionAttempt {
                    text: "ok".into(),
                    tokens_prompt: Some(3),
                    tokens_completion: Some(1),
                    provider_cost: None,
                }),
                StubBehavior::AlwaysRateLimited => {
                    Err(ProviderError::RateLimit("slow down".into()))
                }
                StubBehavior::AuthFailure => Err(ProviderError::Auth("bad key".into())),
                StubBehavior::FatalFailure => Err(ProviderError::Fatal("no such model".into())),
                StubBehavior::HangForever => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "hello".into(),
            model: "stub-model".into(),
            temperature: None,
            max_tokens: None,
        }
    }

    fn fast_policy(retry_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: retry_attempts + 1,
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(2),
            backoff_jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn retries_rate_limits_until_success() {
        let stub = StubProvider::new(StubBehavior::RateLimitedUntil(2));
        let response =
            complete_with_retry(&stub, &request(), &fast_policy(2), Duration::from_secs(5))
                .await
                .unwrap();
        assert_eq!(response.raw_attempts, 3);
        assert_eq!(stub.calls(), 3);
        assert_eq!(response.text, "ok");
    }

    #[tokio::test]
    async fn exhausts_retries_and_reports_attempt_count() {
        let stub = StubProvider::new(StubBehavior::AlwaysRateLimited);
        let failure =
            complete_with_retry(&stub, &request(), &fast_policy(1), Duration::from_secs(5))
                .await
                .unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert_eq!(stub.calls(), 2);
        assert!(matches!(failure.error, ProviderError::RateLimit(_)));
    }

    #[tokio::test]
    async fn auth_errors_are_never_retried() {
        let stub = StubProvider::new(StubBehavior::AuthFailure);
        let failure =
            complete_with_retry(&stub, &request(), &fast_policy(3), Duration::from_secs(5))
                .await
                .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn fatal_errors_are_never_retried() {
        let stub = StubProvider::new(StubBehavior::FatalFailure);
        let failure =
            complete_with_retry(&stub, &request(), &fast_policy(3), Duration::from_secs(5))
                .await
                .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(matches!(failure.error, ProviderError::Fatal(_)));
    }

    #[tokio::test]
    async fn attempt_timeout_is_per_attempt_and_retryable() {
        let stub = StubProvider::new(StubBehavior::HangForever);
        let failure =
            complete_with_retry(&stub, &request(), &fast_policy(1), Duration::from_millis(10))
                .await
                .unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert!(matches!(failure.error, ProviderError::Timeout { .. }));
    }
}
