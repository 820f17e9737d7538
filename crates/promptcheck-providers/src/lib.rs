//! LLM provider clients for PromptCheck.
//!
//! Heterogeneous backends are normalized behind one capability
//! ([`ProviderClient::complete`]); retry, per-attempt timeout, latency
//! measurement and cost attribution wrap the trait in
//! [`complete_with_retry`], so policy stays testable with stub providers.

pub mod client;
pub mod error;
pub mod openai_compat;
pub mod pricing;
pub mod registry;
pub mod retry;

pub use client::{CompletionAttempt, CompletionRequest, ProviderClient};
pub use error::{ProviderError, ProviderFailure};
pub use openai_compat::OpenAiCompatibleClient;
pub use registry::{resolve_api_key, ProviderRegistry};
pub use retry::{complete_with_retry, RetryPolicy};
