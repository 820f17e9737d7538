//! Provider failure taxonomy.
//!
//! The kind decides retry eligibility: auth and fatal errors surface
//! immediately, everything else is retried under the configured policy.

use thiserror::Error;

/// A categorized provider call failure.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Bad or missing credential. Never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider rejected the call with a rate limit. Retried.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// A single attempt exceeded its timeout. Retried.
    #[error("attempt timed out after {seconds}s")]
    Timeout { seconds: f64 },

    /// Connection-level failure or 5xx. Retried.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Malformed request, unsupported model or similar. Never retried.
    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::Timeout { .. }
                | ProviderError::TransientNetwork(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Auth(_) => "auth",
            ProviderError::RateLimit(_) => "rate_limit",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::TransientNetwork(_) => "transient_network",
            ProviderError::Fatal(_) => "fatal",
        }
    }
}

/// Terminal failure returned once retries are exhausted (or the error was
/// never retryable), wrapping the last observed cause and the attempt
/// count.
#[derive(Debug, Clone, Error)]
#[error("provider call failed after {attempts} attempt(s): {error}")]
pub struct ProviderFailure {
    pub error: ProviderError,
    pub attempts: u32,
}
