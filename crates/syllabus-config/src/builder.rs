use std::path::PathBuf;
use std::time::Duration;

use syllabus_utils::error::ConfigError;

use super::{Config, ConfigSource, SimulatedConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use syllabus_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .provider("simulated")
    ///     .batch_size(5)
    ///     .inter_window_delay(Duration::ZERO)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.batch_size(), 5);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent construction of a [`Config`] without touching the environment or
/// config files.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    provider: Option<String>,
    model: Option<String>,
    budget: Option<u32>,
    timeout: Option<Duration>,
    batch_size: Option<usize>,
    window: Option<usize>,
    inter_window_delay: Option<Duration>,
    sample_window_chars: Option<usize>,
    checkpoint_dir: Option<PathBuf>,
    simulated_concepts: Option<usize>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Maximum number of model calls for the process.
    #[must_use]
    pub fn budget(mut self, calls: u32) -> Self {
        self.budget = Some(calls);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    #[must_use]
    pub fn window(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn inter_window_delay(mut self, delay: Duration) -> Self {
        self.inter_window_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn sample_window_chars(mut self, chars: usize) -> Self {
        self.sample_window_chars = Some(chars);
        self
    }

    #[must_use]
    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// Number of concepts the simulated provider reports from analysis.
    #[must_use]
    pub fn simulated_concepts(mut self, count: usize) -> Self {
        self.simulated_concepts = Some(count);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a value is out of range.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let source = ConfigSource::Programmatic;
        let mut mark = |key: &str| {
            config
                .source_attribution
                .insert(key.to_string(), source.clone());
        };

        if self.provider.is_some() {
            mark("provider");
        }
        if self.model.is_some() {
            mark("model");
        }
        if self.budget.is_some() {
            mark("budget");
        }
        if self.timeout.is_some() {
            mark("timeout_secs");
        }
        if self.batch_size.is_some() {
            mark("batch_size");
        }
        if self.window.is_some() {
            mark("window");
        }
        if self.inter_window_delay.is_some() {
            mark("inter_window_delay_ms");
        }
        if self.sample_window_chars.is_some() {
            mark("sample_window_chars");
        }
        if self.checkpoint_dir.is_some() {
            mark("checkpoint_dir");
        }
        if self.simulated_concepts.is_some() {
            mark("llm.simulated");
        }

        config.llm.provider = self.provider;
        config.defaults.model = self.model;
        config.llm.budget = self.budget;
        config.defaults.timeout_secs = self.timeout.map(|t| t.as_secs());
        config.batching.batch_size = self.batch_size;
        config.batching.window = self.window;
        config.batching.inter_window_delay_ms = self
            .inter_window_delay
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        config.validation.sample_window_chars = self.sample_window_chars;
        config.checkpoint.dir = self.checkpoint_dir;
        if let Some(concepts) = self.simulated_concepts {
            config.llm.simulated = Some(SimulatedConfig {
                concepts: Some(concepts),
                fragment_chars: None,
            });
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_attributes_programmatic_source() {
        let config = Config::builder()
            .provider("simulated")
            .window(4)
            .build()
            .unwrap();

        assert_eq!(config.provider(), "simulated");
        assert_eq!(config.window(), 4);
        assert_eq!(config.source_of("window"), "programmatic");
        assert_eq!(config.source_of("batch_size"), "default");
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        let result = Config::builder().window(0).build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
