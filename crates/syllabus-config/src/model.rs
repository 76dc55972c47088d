use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of concepts per content batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default number of batches in flight at once.
pub const DEFAULT_WINDOW: usize = 2;
/// Default pause between concurrency windows.
pub const DEFAULT_INTER_WINDOW_DELAY_MS: u64 = 2_000;
/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default size of each head/middle/tail window sent to the remote reviewer.
pub const DEFAULT_SAMPLE_WINDOW_CHARS: usize = 4_000;

/// Configuration for syllabus runs.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > config file > built-in defaults.
///
/// # Discovery
///
/// Use [`Config::discover()`] for CLI-like behavior that:
/// - Uses an explicit `--config` path when given
/// - Otherwise reads `$SYLLABUS_HOME/config.toml` when that variable is set
/// - Otherwise searches for `.syllabus/config.toml` upward from the current directory
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// model = "claude-sonnet-4-5"
/// timeout_secs = 300
///
/// [llm]
/// provider = "anthropic"
/// budget = 40
///
/// [llm.anthropic]
/// api_key_env = "ANTHROPIC_API_KEY"
///
/// [batching]
/// batch_size = 10
/// window = 2
/// inter_window_delay_ms = 2000
///
/// [checkpoint]
/// dir = ".syllabus/checkpoints"
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub defaults: Defaults,
    pub llm: LlmConfig,
    pub batching: BatchingConfig,
    pub tokens: TokenBudgets,
    pub validation: ValidationConfig,
    pub checkpoint: CheckpointConfig,
    /// Source attribution for each setting (for diagnostics).
    pub source_attribution: HashMap<String, ConfigSource>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Model name passed to the provider. Providers may also set their own.
    pub model: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// One of `anthropic`, `openrouter`, `simulated`.
    pub provider: Option<String>,
    /// Maximum model calls per process; unlimited when unset.
    pub budget: Option<u32>,
    pub anthropic: Option<AnthropicConfig>,
    pub openrouter: Option<OpenRouterConfig>,
    pub simulated: Option<SimulatedConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRouterConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Settings for the deterministic offline provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatedConfig {
    /// Number of concepts the fake analysis stage reports.
    pub concepts: Option<usize>,
    /// Characters per streamed fragment.
    pub fragment_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BatchingConfig {
    pub batch_size: Option<usize>,
    pub window: Option<usize>,
    pub inter_window_delay_ms: Option<u64>,
}

/// Max-token budgets per model call kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokenBudgets {
    pub lifecycle: Option<u32>,
    pub analysis: Option<u32>,
    pub framework: Option<u32>,
    pub batch: Option<u32>,
    pub narrative: Option<u32>,
    pub review: Option<u32>,
}

impl TokenBudgets {
    #[must_use]
    pub fn lifecycle(&self) -> u32 {
        self.lifecycle.unwrap_or(1_000)
    }

    #[must_use]
    pub fn analysis(&self) -> u32 {
        self.analysis.unwrap_or(4_000)
    }

    #[must_use]
    pub fn framework(&self) -> u32 {
        self.framework.unwrap_or(4_000)
    }

    /// Per content batch; sized for ten concept blocks.
    #[must_use]
    pub fn batch(&self) -> u32 {
        self.batch.unwrap_or(8_000)
    }

    #[must_use]
    pub fn narrative(&self) -> u32 {
        self.narrative.unwrap_or(4_000)
    }

    #[must_use]
    pub fn review(&self) -> u32 {
        self.review.unwrap_or(2_000)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    pub sample_window_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    pub dir: Option<PathBuf>,
}

/// Source of a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    ConfigFile(PathBuf),
    Programmatic,
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::ConfigFile(path) => write!(f, "config ({})", path.display()),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Defaults => write!(f, "default"),
        }
    }
}

/// CLI overrides fed into discovery.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub batch_size: Option<usize>,
    pub window: Option<usize>,
    pub inter_window_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub checkpoint_dir: Option<PathBuf>,
}

impl Config {
    /// Minimal configuration with built-in defaults only.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn minimal_for_testing() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or("anthropic")
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batching.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.batching.window.unwrap_or(DEFAULT_WINDOW)
    }

    #[must_use]
    pub fn inter_window_delay(&self) -> Duration {
        Duration::from_millis(
            self.batching
                .inter_window_delay_ms
                .unwrap_or(DEFAULT_INTER_WINDOW_DELAY_MS),
        )
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn sample_window_chars(&self) -> usize {
        self.validation
            .sample_window_chars
            .unwrap_or(DEFAULT_SAMPLE_WINDOW_CHARS)
    }

    /// Directory holding per-subject checkpoint files.
    ///
    /// Falls back to `.syllabus/checkpoints` under the platform data directory,
    /// then under the working directory.
    #[must_use]
    pub fn checkpoint_dir(&self) -> PathBuf {
        if let Some(dir) = &self.checkpoint.dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join("syllabus").join("checkpoints"))
            .unwrap_or_else(|| PathBuf::from(".syllabus").join("checkpoints"))
    }

    /// Source label for a key, `default` when never overridden.
    #[must_use]
    pub fn source_of(&self, key: &str) -> String {
        self.source_attribution
            .get(key)
            .map_or_else(|| ConfigSource::Defaults.to_string(), ToString::to_string)
    }
}
