//! Client for OpenAI-wire-format chat completion APIs.
//!
//! OpenAI, Groq and OpenRouter all speak the same `/chat/completions`
//! shape; they differ only in base URL and credential. One client covers
//! the whole provider set.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::client::{CompletionAttempt, CompletionRequest, ProviderClient};
use crate::error::ProviderError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Response header OpenRouter uses to report the exact call cost.
const COST_HEADER: &str = "x-openrouter-cost";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    name: String,
    base_url: String,
    /// Missing credential surfaces as `AuthError` at call time, not at
    /// construction.
    api_key: Option<String>,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn openai(api_key: Option<String>) -> Self {
        Self::with_base_url("openai", OPENAI_BASE_URL, api_key)
    }

    pub fn groq(api_key: Option<String>) -> Self {
        Self::with_base_url("groq", GROQ_BASE_URL, api_key)
    }

    pub fn openrouter(api_key: Option<String>) -> Self {
        Self::with_base_url("openrouter", OPENROUTER_BASE_URL, api_key)
    }

    pub fn with_base_url(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionAttempt, ProviderError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(ProviderError::Auth(format!(
                "{} API key not configured (set {}_API_KEY or api_keys.{} in the config file)",
                self.name,
                self.name.to_uppercase(),
                self.name,
            )));
        };

        let body = ChatRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let provider_cost = response
            .headers()
            .get(COST_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let parsed: ChatResponse = response.json().await.map_err(|err| {
            ProviderError::Fatal(format!("malformed completion response: {err}"))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::Fatal("completion response contained no choices".to_string())
            })?;

        Ok(CompletionAttempt {
            text,
            tokens_prompt: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            tokens_completion: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
            provider_cost,
        })
    }
}

fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::TransientNetwork(err.to_string())
}

/// Map an HTTP status to the failure taxonomy.
pub(crate) fn classify_status(status: StatusCode, detail: &str) -> ProviderError {
    let detail = truncate(detail, 200);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Auth(format!("{status}: {detail}"))
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit(format!("{status}: {detail}")),
        status if status.is_server_error() => {
            ProviderError::TransientNetwork(format!("{status}: {detail}"))
        }
        status => ProviderError::Fatal(format!("{status}: {detail}")),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
