//! Provider registry and credential resolution.
//!
//! The provider set is closed: adding a backend means registering one
//! more client, never touching dispatch logic.

use std::collections::HashMap;
use std::sync::Arc;

use promptcheck_core::RunConfig;

use crate::client::ProviderClient;
use crate::openai_compat::OpenAiCompatibleClient;

/// Clients keyed by provider name. `"default"` resolves to the global
/// default provider.
pub struct ProviderRegistry {
    clients: HashMap<String, Arc<dyn ProviderClient>>,
    default_provider: String,
}

impl ProviderRegistry {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            clients: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Build the registry for the supported backends, resolving each
    /// credential with precedence: environment variable > config file >
    /// unset (missing credential surfaces as an auth error at call time).
    pub fn from_config(config: &RunConfig) -> Self {
        let mut registry = Self::new(config.default_model.provider.clone());
        registry.insert(
            "openai",
            Arc::new(OpenAiCompatibleClient::openai(resolve_api_key("openai", config))),
        );
        registry.insert(
            "groq",
            Arc::new(OpenAiCompatibleClient::groq(resolve_api_key("groq", config))),
        );
        registry.insert(
            "openrouter",
            Arc::new(OpenAiCompatibleClient::openrouter(resolve_api_key(
                "openrouter",
                config,
            ))),
        );
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, client: Arc<dyn ProviderClient>) {
        self.clients.insert(name.into(), client);
    }

    /// Look up a client by provider name, resolving `"default"` first.
    pub fn get(&self, provider: &str) -> Option<Arc<dyn ProviderClient>> {
        let name = if provider == "default" {
            self.default_provider.as_str()
        } else {
            provider
        };
        self.clients.get(name).cloned()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Resolve the API key for a provider: `<PROVIDER>_API_KEY` environment
/// variable first, then the config file's `api_keys` map.
pub fn resolve_api_key(provider: &str, config: &RunConfig) -> Option<String> {
    let env_var = format!("{}_API_KEY", provider.to_uppercase());
    if let Ok(key) = std::env::var(&env_var) {
        if !key.is_empty() {
            return Some(key);
        }
    }
    config.api_keys.get(provider).cloned()
}
