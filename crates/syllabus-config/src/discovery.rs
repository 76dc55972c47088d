use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use super::{
    BatchingConfig, CheckpointConfig, CliArgs, Config, ConfigSource, Defaults, LlmConfig,
    TokenBudgets, ValidationConfig,
};
use syllabus_utils::error::ConfigError;

/// Environment variable pointing at a directory containing `config.toml`.
pub(crate) const HOME_ENV_VAR: &str = "SYLLABUS_HOME";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    llm: Option<LlmConfig>,
    batching: Option<BatchingConfig>,
    tokens: Option<TokenBudgets>,
    validation: Option<ValidationConfig>,
    checkpoint: Option<CheckpointConfig>,
}

/// Copy `$file.$field` onto `$target.$field` when set, recording its source.
macro_rules! overlay {
    (
        $target:expr, $file:expr, $attribution:expr, $source:expr,
        { $($field:ident => $key:literal),+ $(,)? }
    ) => {
        $(
            if $file.$field.is_some() {
                $target.$field = $file.$field;
                $attribution.insert($key.to_string(), $source.clone());
            }
        )+
    };
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid depending on the process CWD.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Config::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            config.apply_file(file_config, ConfigSource::ConfigFile(path.clone()));
        }

        config.apply_cli(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Locate a config file: `$SYLLABUS_HOME/config.toml`, then the first
    /// `.syllabus/config.toml` found walking upward from `start_dir`.
    pub(crate) fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        if let Some(home) = env::var_os(HOME_ENV_VAR) {
            let candidate = PathBuf::from(home).join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        start_dir
            .ancestors()
            .map(|dir| dir.join(".syllabus").join("config.toml"))
            .find(|candidate| candidate.is_file())
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed: TomlConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))?;
        Ok(parsed)
    }

    fn apply_file(&mut self, file: TomlConfig, source: ConfigSource) {
        let attribution: &mut HashMap<String, ConfigSource> = &mut self.source_attribution;

        if let Some(defaults) = file.defaults {
            overlay!(self.defaults, defaults, attribution, source, {
                model => "model",
                timeout_secs => "timeout_secs",
            });
        }

        if let Some(llm) = file.llm {
            overlay!(self.llm, llm, attribution, source, {
                provider => "provider",
                budget => "budget",
                anthropic => "llm.anthropic",
                openrouter => "llm.openrouter",
                simulated => "llm.simulated",
            });
        }

        if let Some(batching) = file.batching {
            overlay!(self.batching, batching, attribution, source, {
                batch_size => "batch_size",
                window => "window",
                inter_window_delay_ms => "inter_window_delay_ms",
            });
        }

        if let Some(tokens) = file.tokens {
            overlay!(self.tokens, tokens, attribution, source, {
                lifecycle => "tokens.lifecycle",
                analysis => "tokens.analysis",
                framework => "tokens.framework",
                batch => "tokens.batch",
                narrative => "tokens.narrative",
                review => "tokens.review",
            });
        }

        if let Some(validation) = file.validation {
            overlay!(self.validation, validation, attribution, source, {
                sample_window_chars => "sample_window_chars",
            });
        }

        if let Some(checkpoint) = file.checkpoint {
            overlay!(self.checkpoint, checkpoint, attribution, source, {
                dir => "checkpoint_dir",
            });
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let source = ConfigSource::Cli;
        let attribution = &mut self.source_attribution;
        let cli = cli.clone();

        overlay!(self.defaults, cli, attribution, source, {
            model => "model",
            timeout_secs => "timeout_secs",
        });
        overlay!(self.llm, cli, attribution, source, {
            provider => "provider",
        });
        overlay!(self.batching, cli, attribution, source, {
            batch_size => "batch_size",
            window => "window",
            inter_window_delay_ms => "inter_window_delay_ms",
        });
        if cli.checkpoint_dir.is_some() {
            self.checkpoint.dir = cli.checkpoint_dir;
            attribution.insert("checkpoint_dir".to_string(), source);
        }
    }
}
