//! Model client and provider backends for syllabus
//!
//! Every provider implements [`LlmBackend`] (request/response plus streamed
//! calls). Stages never talk to a backend directly: they go through
//! [`ModelClient`], which owns cooperative cancellation, and drain streams
//! through [`StreamAggregator`].

mod anthropic_backend;
mod budgeted_backend;
mod client;
mod extract;
mod http_client;
mod openrouter_backend;
mod simulated_backend;
mod stream;
#[cfg(any(test, feature = "test-utils"))]
mod test_support;
mod types;

pub use budgeted_backend::BudgetedBackend;
pub use client::ModelClient;
pub use extract::{extract_json_object, parse_json_object};
pub use simulated_backend::{DEFAULT_SIMULATED_CONCEPTS, SimulatedBackend};
pub use stream::StreamAggregator;
#[cfg(any(test, feature = "test-utils"))]
pub use test_support::{RecordedCall, RecordingBackend};
pub use types::{FragmentStream, LlmBackend, LlmInvocation, LlmResult, Message, Role};

pub use syllabus_utils::error::LlmError;

pub(crate) use anthropic_backend::AnthropicBackend;
pub(crate) use openrouter_backend::OpenRouterBackend;

use std::sync::Arc;
use syllabus_config::Config;

/// Construct the backend for a provider name, without budget wrapping.
///
/// # Errors
///
/// `LlmError::Unsupported` for an unknown provider, `LlmError::Misconfiguration`
/// for invalid provider settings.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    match provider {
        "anthropic" => Ok(Box::new(AnthropicBackend::new_from_config(config)?)),
        "openrouter" => Ok(Box::new(OpenRouterBackend::new_from_config(config)?)),
        "simulated" => Ok(Box::new(SimulatedBackend::new_from_config(config))),
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{unknown}'. \
             Supported providers: anthropic, openrouter, simulated."
        ))),
    }
}

/// Create the configured backend.
///
/// The backend is wrapped in a [`BudgetedBackend`] when `[llm] budget` or
/// `SYLLABUS_LLM_BUDGET` sets a limit.
///
/// # Errors
///
/// See [`construct_backend_for_provider`].
pub fn from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let provider = config.provider();
    let backend = construct_backend_for_provider(provider, config)?;

    match BudgetedBackend::resolve_limit(config.llm.budget) {
        Some(limit) => Ok(Arc::new(BudgetedBackend::new(backend, limit))),
        None => Ok(Arc::from(backend)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_provider_fails_cleanly() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("gemini-cli".to_string());
        let err = from_config(&config).err().unwrap();
        assert!(matches!(err, LlmError::Unsupported(ref msg) if msg.contains("gemini-cli")));
    }

    #[test]
    fn test_simulated_provider_needs_no_credentials() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("simulated".to_string());
        let backend = from_config(&config).unwrap();
        assert_eq!(backend.name(), "simulated");
    }

    #[test]
    fn test_missing_api_key_is_misconfiguration() {
        let mut config = Config::minimal_for_testing();
        config.llm.openrouter = Some(syllabus_config::OpenRouterConfig {
            api_key_env: Some("SYLLABUS_TEST_UNSET_OPENROUTER_KEY".to_string()),
            ..Default::default()
        });
        config.llm.provider = Some("openrouter".to_string());
        let err = from_config(&config).err().unwrap();
        assert!(matches!(err, LlmError::Misconfiguration(_)));
    }
}
