//! Anthropic Messages API backend
//!
//! Request/response calls read the `content` blocks of the reply. Streamed
//! calls set `"stream": true` and yield the text of every
//! `content_block_delta` / `text_delta` event.

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, future};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::LlmError;
use crate::http_client::{HttpClient, sse_data_stream};
use crate::types::{FragmentStream, LlmBackend, LlmInvocation, LlmResult, Message, Role};
use syllabus_config::Config;

/// Default Anthropic API endpoint
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Clone)]
pub(crate) struct AnthropicBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
    temperature: f32,
}

impl AnthropicBackend {
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

    /// Build from `[llm.anthropic]`, reading the key from the configured env var.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key variable is unset.
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.anthropic.clone().unwrap_or_default();
        let api_key_env = section
            .api_key_env
            .as_deref()
            .unwrap_or("ANTHROPIC_API_KEY");

        let api_key = std::env::var(api_key_env).map_err(|_| {
            LlmError::Misconfiguration(format!(
                "Anthropic API key not found in environment variable '{api_key_env}'. \
                 Set this variable or configure a different api_key_env in [llm.anthropic]."
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

    fn build_request(&self, inv: &LlmInvocation, model: &str, stream: bool) -> AnthropicRequest {
        AnthropicRequest {
            model: model.to_string(),
            messages: convert_messages(&inv.messages),
            max_tokens: inv.max_tokens,
            temperature: self.temperature,
            system: inv.system_prompt.clone(),
            stream,
        }
    }

    fn http_request(&self, body: &AnthropicRequest) -> reqwest::RequestBuilder {
        self.client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }
}

fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    messages
        .iter()
        .map(|msg| AnthropicMessage {
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            }
            .to_string(),
            content: msg.content.clone(),
        })
        .collect()
}

/// Text carried by one streamed event, `None` for events without text.
fn stream_event_text(data: &str) -> Result<Option<String>, LlmError> {
    let event: Value = serde_json::from_str(data)
        .map_err(|e| LlmError::Transport(format!("Invalid Anthropic stream event: {e}")))?;

    match event.get("type").and_then(Value::as_str) {
        Some("content_block_delta") => {
            let delta = &event["delta"];
            if delta.get("type").and_then(Value::as_str) == Some("text_delta") {
                Ok(delta
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string))
            } else {
                Ok(None)
            }
        }
        Some("error") => {
            let message = event["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error");
            Err(LlmError::ProviderOutage(format!("anthropic: {message}")))
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = self.resolve_model(&inv);
        debug!(
            provider = "anthropic",
            label = %inv.label,
            model = %model,
            max_tokens = inv.max_tokens,
            "Invoking Anthropic backend"
        );

        let body = self.build_request(&inv, &model, false);
        let response = self
            .client
            .execute(self.http_request(&body), inv.timeout, "anthropic")
            .await?;

        let response_body: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let content: String = response_body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(LlmError::Transport(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let mut result = LlmResult::new(content, "anthropic", model);
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.input_tokens, usage.output_tokens);
        }
        Ok(result)
    }

    async fn invoke_streaming(&self, inv: LlmInvocation) -> Result<FragmentStream, LlmError> {
        let model = self.resolve_model(&inv);
        debug!(
            provider = "anthropic",
            label = %inv.label,
            model = %model,
            "Opening Anthropic stream"
        );

        let body = self.build_request(&inv, &model, true);
        let response = self
            .client
            .execute(self.http_request(&body), inv.timeout, "anthropic")
            .await?;

        let fragments = sse_data_stream(response, "anthropic")
            .try_filter_map(|data| future::ready(stream_event_text(&data)))
            .try_filter(|text| future::ready(!text.is_empty()));

        Ok(fragments.boxed())
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
