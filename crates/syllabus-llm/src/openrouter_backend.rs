//! OpenRouter backend (OpenAI-compatible chat completions)

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, future};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::LlmError;
use crate::http_client::{HttpClient, sse_data_stream};
use crate::types::{FragmentStream, LlmBackend, LlmInvocation, LlmResult, Message, Role};
use syllabus_config::Config;

/// Default OpenRouter API endpoint
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// X-Title header value
const DEFAULT_TITLE: &str = "syllabus";

const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4.5";

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Terminal marker of an OpenAI-style event stream.
const DONE_MARKER: &str = "[DONE]";

#[derive(Clone)]
pub(crate) struct OpenRouterBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
    temperature: f32,
}

impl OpenRouterBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
        temperature: f32,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
            temperature,
        })
    }

    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key variable is unset.
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.openrouter.clone().unwrap_or_default();
        let api_key_env = section
            .api_key_env
            .as_deref()
            .unwrap_or("OPENROUTER_API_KEY");

        let api_key = std::env::var(api_key_env).map_err(|_| {
            LlmError::Misconfiguration(format!(
                "OpenRouter API key not found in environment variable '{api_key_env}'. \
                 Set this variable or configure a different api_key_env in [llm.openrouter]."
            ))
        })?;

        let default_model = section
            .model
            .or_else(|| config.defaults.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self::new(
            api_key,
            section.base_url,
            default_model,
            section.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        )
    }

    fn resolve_model(&self, inv: &LlmInvocation) -> String {
        if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        }
    }

    fn build_request(&self, inv: &LlmInvocation, model: &str, stream: bool) -> OpenRouterRequest {
        let mut messages = Vec::with_capacity(inv.messages.len() + 1);
        if let Some(system) = &inv.system_prompt {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(inv.messages.iter().map(convert_message));

        OpenRouterRequest {
            model: model.to_string(),
            messages,
            max_tokens: inv.max_tokens,
            temperature: self.temperature,
            stream,
        }
    }

    fn http_request(&self, body: &OpenRouterRequest) -> reqwest::RequestBuilder {
        self.client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", DEFAULT_TITLE)
            .header("Content-Type", "application/json")
            .json(body)
    }
}

fn convert_message(msg: &Message) -> OpenAiMessage {
    OpenAiMessage {
        role: match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
        .to_string(),
        content: msg.content.clone(),
    }
}

/// Delta text of one streamed chunk; `None` for role-only chunks and `[DONE]`.
fn stream_chunk_text(data: &str) -> Result<Option<String>, LlmError> {
    if data.trim() == DONE_MARKER {
        return Ok(None);
    }
    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| LlmError::Transport(format!("Invalid OpenRouter stream chunk: {e}")))?;

    if let Some(message) = chunk["error"]["message"].as_str() {
        return Err(LlmError::ProviderOutage(format!("openrouter: {message}")));
    }

    Ok(chunk["choices"][0]["delta"]["content"]
        .as_str()
        .map(str::to_string))
}

#[async_trait]
impl LlmBackend for OpenRouterBackend {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = self.resolve_model(&inv);
        debug!(
            provider = "openrouter",
            label = %inv.label,
            model = %model,
            max_tokens = inv.max_tokens,
            "Invoking OpenRouter backend"
        );

        let body = self.build_request(&inv, &model, false);
        let response = self
            .client
            .execute(self.http_request(&body), inv.timeout, "openrouter")
            .await?;

        let response_body: OpenRouterResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse OpenRouter response: {e}"))
        })?;

        let choice = response_body.choices.first().ok_or_else(|| {
            LlmError::Transport("OpenRouter response missing choices[0]".to_string())
        })?;
        let content = choice.message.content.clone().ok_or_else(|| {
            LlmError::Transport("OpenRouter response missing content in choices[0]".to_string())
        })?;

        let mut result = LlmResult::new(content, "openrouter", model);
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(result)
    }

    async fn invoke_streaming(&self, inv: LlmInvocation) -> Result<FragmentStream, LlmError> {
        let model = self.resolve_model(&inv);
        debug!(
            provider = "openrouter",
            label = %inv.label,
            model = %model,
            "Opening OpenRouter stream"
        );

        let body = self.build_request(&inv, &model, true);
        let response = self
            .client
            .execute(self.http_request(&body), inv.timeout, "openrouter")
            .await?;

        let fragments = sse_data_stream(response, "openrouter")
            .try_filter_map(|data| future::ready(stream_chunk_text(&data)))
            .try_filter(|text| future::ready(!text.is_empty()));

        Ok(fragments.boxed())
    }
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
