//! Global run configuration.
//!
//! Loaded once from `promptcheck.config.yaml` and passed explicitly through
//! the loader, aggregator and provider client. A missing file yields the
//! defaults; credentials additionally resolve from `<PROVIDER>_API_KEY`
//! environment variables inside the provider registry.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::case::{ModelConfig, ModelParameters};
use crate::error::ConfigError;

/// Standard config file name, looked up in the config directory.
pub const CONFIG_FILENAME: &str = "promptcheck.config.yaml";

/// Per-attempt timeout when neither the test case nor the global config
/// sets one.
pub const DEFAULT_TIMEOUT_S: f64 = 30.0;

/// Additional attempts after the first failure when unconfigured.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;

/// Default model used when a test case says `provider: "default"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultModel {
    pub provider: String,
    pub model_name: String,
    pub parameters: ModelParameters,
}

impl Default for DefaultModel {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            parameters: ModelParameters::default(),
        }
    }
}

/// The immutable global configuration for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Provider name -> API key. Environment variables take precedence.
    pub api_keys: BTreeMap<String, String>,
    pub default_model: DefaultModel,
}

impl RunConfig {
    /// Load the config from `dir/promptcheck.config.yaml`.
    ///
    /// A missing file is not an error; everything in the config has a
    /// usable default.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml { path, source })
    }

    /// Resolve a test case's model config against the global defaults.
    ///
    /// `"default"` provider/model names are replaced, and parameters merge
    /// global-default first, test-specific last.
    pub fn resolve_model(&self, case_cfg: &ModelConfig) -> ModelConfig {
        let provider = if case_cfg.provider == "default" {
            self.default_model.provider.clone()
        } else {
            case_cfg.provider.clone()
        };
        let model_name = if case_cfg.model_name == "default" {
            self.default_model.model_name.clone()
        } else {
            case_cfg.model_name.clone()
        };
        ModelConfig {
            provider,
            model_name,
            parameters: self
                .default_model
                .parameters
                .merged_with(&case_cfg.parameters),
        }
    }

    /// Per-attempt timeout for a resolved model config, in seconds.
    ///
    /// The loader rejects out-of-range values; programmatically built
    /// parameters that are non-positive or non-finite fall back to the
    /// default rather than producing an unusable Duration.
    pub fn effective_timeout_s(&self, params: &ModelParameters) -> f64 {
        let timeout = params
            .timeout_s
            .or(self.default_model.parameters.timeout_s)
            .unwrap_or(DEFAULT_TIMEOUT_S);
        if timeout.is_finite() && timeout > 0.0 {
            timeout
        } else {
            DEFAULT_TIMEOUT_S
        }
    }

    /// Retry attempts (after the first) for a resolved model config.
    pub fn effective_retry_attempts(&self, params: &ModelParameters) -> u32 {
        params
            .retry_attempts
            .or(self.default_model.parameters.retry_attempts)
            .unwrap_or(DEFAULT_RETRY_ATTEMPTS)
    }
}
