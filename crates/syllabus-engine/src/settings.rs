use std::time::Duration;

use syllabus_config::{Config, TokenBudgets};
use syllabus_validation::ReviewSettings;

use crate::scheduler::BatchScheduler;

/// Effective engine settings resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Model name; empty selects the provider default.
    pub model: String,
    pub timeout: Duration,
    pub tokens: TokenBudgets,
    pub batch_size: usize,
    pub window: usize,
    pub inter_window_delay: Duration,
    pub sample_window_chars: usize,
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.defaults.model.clone().unwrap_or_default(),
            timeout: config.timeout(),
            tokens: config.tokens.clone(),
            batch_size: config.batch_size(),
            window: config.window(),
            inter_window_delay: config.inter_window_delay(),
            sample_window_chars: config.sample_window_chars(),
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> BatchScheduler {
        BatchScheduler::new(self.batch_size, self.window, self.inter_window_delay)
    }

    #[must_use]
    pub fn review(&self) -> ReviewSettings {
        ReviewSettings {
            model: self.model.clone(),
            timeout: self.timeout,
            max_tokens: self.tokens.review(),
            sample_window_chars: self.sample_window_chars,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
