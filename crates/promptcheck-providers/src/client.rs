//! The provider capability interface.

use async_trait::async_trait;

use promptcheck_core::ModelConfig;

use crate::error::ProviderError;

/// One completion request, already resolved against the global defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Build a request from a substituted prompt and a resolved model
    /// config.
    pub fn new(prompt: impl Into<String>, resolved: &ModelConfig) -> Self {
        Self {
            prompt: prompt.into(),
            model: resolved.model_name.clone(),
            temperature: resolved.parameters.temperature,
            max_tokens: resolved.parameters.max_tokens,
        }
    }
}

/// Raw outcome of a single successful attempt, before retry accounting,
/// latency measurement and cost attribution turn it into a
/// [`promptcheck_core::ProviderResponse`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionAttempt {
    pub text: String,
    pub tokens_prompt: Option<u32>,
    pub tokens_completion: Option<u32>,
    /// Cost reported by the provider itself, when available.
    pub provider_cost: Option<f64>,
}

/// A normalized LLM backend. Implementations perform exactly one call
/// attempt per `complete` invocation; retry and timeout policy wrap the
/// trait from the outside so they stay testable with stub providers.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name as used in test files and the registry.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionAttempt, ProviderError>;
}
