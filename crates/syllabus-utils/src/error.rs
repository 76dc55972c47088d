use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::StageId;

/// Run-level error type returned by the generation pipeline.
///
/// `PipelineError` separates the three outcomes a caller must treat differently:
///
/// | Variant | Caller behaviour |
/// |---------|------------------|
/// | `Cancelled` | User aborted; exit silently, no error banner |
/// | `UpstreamFailure` | Model call failed or returned unusable content; offer retry |
/// | everything else | Local failure (checkpoint, config, internal); offer retry |
///
/// Low validation scores are never errors; they are returned as data on the
/// `ValidationResult`.
///
/// # Example
///
/// ```rust
/// use syllabus_utils::error::{LlmError, PipelineError};
/// use syllabus_utils::types::StageId;
///
/// let err = PipelineError::from_llm(StageId::Content, LlmError::Cancelled);
/// assert!(err.is_cancelled());
///
/// let err = PipelineError::from_llm(StageId::Content, LlmError::Transport("reset".into()));
/// assert!(!err.is_cancelled());
/// ```
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Generation cancelled")]
    Cancelled,

    #[error("Stage {stage} failed: {source}")]
    UpstreamFailure {
        stage: StageId,
        #[source]
        source: LlmError,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid transition for stage {stage}: {from} -> {to}")]
    InvalidTransition {
        stage: StageId,
        from: String,
        to: String,
    },
}

impl PipelineError {
    /// Attribute a model-client error to a stage.
    ///
    /// Cancellation is never wrapped as an upstream failure.
    #[must_use]
    pub fn from_llm(stage: StageId, source: LlmError) -> Self {
        match source {
            LlmError::Cancelled => Self::Cancelled,
            source => Self::UpstreamFailure { stage, source },
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The stage a failure is attributed to, when known.
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        match self {
            Self::UpstreamFailure { stage, .. } | Self::InvalidTransition { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }

    /// User-facing message with context and suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ModelIntegration,
    StageExecution,
    Storage,
    ResourceLimits,
    Cancellation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::ModelIntegration => write!(f, "Model Integration"),
            Self::StageExecution => write!(f, "Stage Execution"),
            Self::Storage => write!(f, "Storage"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Cancellation => write!(f, "Cancellation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },
}

/// Checkpoint storage errors
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O failed at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Checkpoint serialization failed: {0}")]
    Serialization(String),

    #[error("Checkpoint for '{subject}' is corrupt: {reason}")]
    Corrupt { subject: String, reason: String },
}

/// Errors raised by the model client and its backends.
///
/// No retry happens at this layer; every variant propagates to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// The run's cancellation token was signalled
    #[error("Cancelled")]
    Cancelled,

    /// Transport-level failure (HTTP connectivity, broken stream)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    /// Response arrived but could not be parsed where parsing is required
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Cancelled => "Model call cancelled".to_string(),
            Self::Transport(msg) => format!("Model transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("Model provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("Model provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("Model provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("Model invocation timed out after {duration:?}")
            }
            Self::BudgetExceeded { limit, attempted } => {
                format!("Model call budget exceeded: attempted {attempted} calls, limit is {limit}")
            }
            Self::MalformedResponse(msg) => format!("Model returned unusable content: {msg}"),
            Self::Misconfiguration(msg) => format!("Model configuration error: {msg}"),
            Self::Unsupported(msg) => format!("Model feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Cancelled => None,
            Self::Transport(_) => Some(
                "Transport errors occur when the model service cannot be reached \
                 or the stream breaks."
                    .to_string(),
            ),
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage(_) => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::Timeout { .. } => Some(
                "Timeouts occur when a model call takes longer than the configured limit."
                    .to_string(),
            ),
            Self::BudgetExceeded { .. } => {
                Some("Budget limits prevent excessive model calls and costs.".to_string())
            }
            Self::MalformedResponse(_) => Some(
                "The analysis stage requires a JSON object; the model returned something else."
                    .to_string(),
            ),
            Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid provider settings.".to_string(),
            ),
            Self::Unsupported(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Cancelled => Vec::new(),
            Self::Transport(_) | Self::ProviderOutage(_) => vec![
                "Verify network connectivity".to_string(),
                "Rerun with --resume to continue from the last completed stage".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that the required API key environment variable is set".to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) => vec![
                "Wait a few minutes and rerun with --resume".to_string(),
                "Lower [batching] window or raise inter_window_delay_ms".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Increase [defaults] timeout_secs in .syllabus/config.toml".to_string(),
                "Reduce [batching] batch_size so each call produces less text".to_string(),
            ],
            Self::BudgetExceeded { .. } => vec![
                "Increase [llm] budget or the SYLLABUS_LLM_BUDGET environment variable".to_string(),
            ],
            Self::MalformedResponse(_) => vec![
                "Rerun the generation; model output varies between calls".to_string(),
            ],
            Self::Misconfiguration(_) => vec![
                "Check the [llm] section of .syllabus/config.toml".to_string(),
            ],
            Self::Unsupported(_) => vec![
                "Use one of the supported providers: anthropic, openrouter, simulated".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Transport(_) | Self::ProviderOutage(_) | Self::MalformedResponse(_) => {
                ErrorCategory::ModelIntegration
            }
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) | Self::BudgetExceeded { .. } => ErrorCategory::ResourceLimits,
            Self::Timeout { .. } => ErrorCategory::StageExecution,
        }
    }
}

impl UserFriendlyError for CheckpointError {
    fn user_message(&self) -> String {
        match self {
            Self::Io { path, .. } => format!("Could not read or write checkpoint at {path}"),
            Self::Serialization(msg) => format!("Could not encode checkpoint: {msg}"),
            Self::Corrupt { subject, .. } => {
                format!("Saved progress for '{subject}' is unreadable")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Io { reason, .. } | Self::Corrupt { reason, .. } => Some(reason.clone()),
            Self::Serialization(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Corrupt { subject, .. } => vec![format!(
                "Run 'syllabus checkpoint clear \"{subject}\"' and start fresh"
            )],
            _ => vec!["Check permissions on the checkpoint directory".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(msg) => format!("Configuration file is invalid: {msg}"),
            Self::InvalidValue { key, value } => format!("Invalid value '{value}' for '{key}'"),
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
        }
    }

    fn context(&self) -> Option<String> {
        Some(
            "Configuration is loaded from --config, $SYLLABUS_HOME or .syllabus/config.toml."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        vec!["Fix the reported key or remove it to use the default".to_string()]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl UserFriendlyError for PipelineError {
    fn user_message(&self) -> String {
        match self {
            Self::Cancelled => "Generation cancelled".to_string(),
            Self::UpstreamFailure { stage, source } => format!(
                "Stage {} ({stage}) failed: {}",
                stage.index(),
                source.user_message()
            ),
            Self::Checkpoint(err) => err.user_message(),
            Self::Config(err) => err.user_message(),
            Self::InvalidTransition { stage, from, to } => {
                format!("Internal error: stage {stage} cannot move from {from} to {to}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Cancelled => None,
            Self::UpstreamFailure { source, .. } => source.context(),
            Self::Checkpoint(err) => err.context(),
            Self::Config(err) => err.context(),
            Self::InvalidTransition { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Cancelled => Vec::new(),
            Self::UpstreamFailure { source, .. } => source.suggestions(),
            Self::Checkpoint(err) => err.suggestions(),
            Self::Config(err) => err.suggestions(),
            Self::InvalidTransition { .. } => {
                vec!["Rerun with --fresh to discard saved progress".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::UpstreamFailure { source, .. } => source.category(),
            Self::Checkpoint(err) => err.category(),
            Self::Config(err) => err.category(),
            Self::InvalidTransition { .. } => ErrorCategory::StageExecution,
        }
    }
}
