//! Core types for the model backend abstraction

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use crate::LlmError;

/// Lazy, finite, non-restartable sequence of text fragments from a streamed call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Input to a backend invocation.
///
/// `label` names the kind of call (`lifecycle`, `analysis`, `framework`,
/// `content`, `narrative`, `review`). Backends that fabricate output key on it;
/// HTTP backends only log it.
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    pub subject: String,
    pub label: String,
    /// Model to use; empty means the backend default.
    pub model: String,
    pub timeout: Duration,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    /// Call-specific structured context (e.g. `batch_index`, `concepts`).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        label: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            subject: subject.into(),
            label: label.into(),
            model: String::new(),
            timeout,
            system_prompt: None,
            messages,
            max_tokens: 4096,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Integer metadata lookup.
    #[must_use]
    pub fn metadata_usize(&self, key: &str) -> Option<usize> {
        self.metadata
            .get(key)
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
    }

    /// String-array metadata lookup; non-string entries are skipped.
    #[must_use]
    pub fn metadata_strings(&self, key: &str) -> Vec<String> {
        self.metadata
            .get(key)
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Result of a request/response invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    pub raw_response: String,
    /// Provider name (e.g. "anthropic", "openrouter", "simulated")
    pub provider: String,
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }
}

/// Trait for model backend implementations
///
/// Every provider (HTTP or simulated) implements both call shapes. Backends do
/// not see the cancellation token; [`crate::ModelClient`] races them against it.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name for logs and results.
    fn name(&self) -> &'static str;

    /// Single request/response call.
    ///
    /// # Errors
    ///
    /// Transport, provider, timeout and budget failures. No retry happens here.
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;

    /// Streamed call. The returned stream yields fragments in order and ends
    /// when the provider signals completion.
    ///
    /// # Errors
    ///
    /// Failures establishing the stream are returned directly; failures after
    /// that surface as `Err` items of the stream.
    async fn invoke_streaming(&self, inv: LlmInvocation) -> Result<FragmentStream, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_builder_and_metadata_lookups() {
        let inv = LlmInvocation::new("Test Subject", "content", Duration::from_secs(30), vec![
            Message::user("write"),
        ])
        .with_max_tokens(1000)
        .with_system_prompt("be terse")
        .with_metadata("batch_index", json!(3))
        .with_metadata("concepts", json!(["a", "b", 7]));

        assert_eq!(inv.max_tokens, 1000);
        assert_eq!(inv.system_prompt.as_deref(), Some("be terse"));
        assert_eq!(inv.metadata_usize("batch_index"), Some(3));
        assert_eq!(inv.metadata_strings("concepts"), vec!["a", "b"]);
        assert!(inv.metadata_strings("missing").is_empty());
        assert!(inv.model.is_empty());
    }

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
