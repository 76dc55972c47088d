//! Configuration management for syllabus
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. Configuration files are TOML with `[defaults]`,
//! `[llm]`, `[batching]`, `[tokens]`, `[validation]` and `[checkpoint]` sections.

mod builder;
mod discovery;
mod model;
mod validation;

pub use builder::ConfigBuilder;
pub use model::{
    AnthropicConfig, BatchingConfig, CheckpointConfig, CliArgs, Config, ConfigSource, Defaults,
    LlmConfig, OpenRouterConfig, SimulatedConfig, TokenBudgets, ValidationConfig,
};
pub use syllabus_utils::error::ConfigError;
pub use validation::SUPPORTED_PROVIDERS;
