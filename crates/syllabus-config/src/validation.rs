use syllabus_utils::error::ConfigError;

use super::Config;

/// Providers `syllabus_llm::from_config` knows how to build.
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["anthropic", "openrouter", "simulated"];

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = self.llm.provider.as_deref()
            && !SUPPORTED_PROVIDERS.contains(&provider)
        {
            return Err(invalid(
                "provider",
                format!(
                    "'{provider}' is not one of {}",
                    SUPPORTED_PROVIDERS.join(", ")
                ),
            ));
        }

        if self.llm.budget == Some(0) {
            return Err(invalid("budget", "must be greater than 0"));
        }

        if let Some(batch_size) = self.batching.batch_size {
            if batch_size == 0 {
                return Err(invalid("batch_size", "must be greater than 0"));
            }
            if batch_size > 100 {
                return Err(invalid("batch_size", "exceeds maximum limit of 100"));
            }
        }

        if self.batching.window == Some(0) {
            return Err(invalid("window", "must be greater than 0"));
        }

        if let Some(delay) = self.batching.inter_window_delay_ms
            && delay > 600_000
        {
            return Err(invalid(
                "inter_window_delay_ms",
                "exceeds maximum limit of 600000 (10 minutes)",
            ));
        }

        if let Some(timeout) = self.defaults.timeout_secs {
            if timeout < 5 {
                return Err(invalid("timeout_secs", "must be at least 5 seconds"));
            }
            if timeout > 7200 {
                return Err(invalid(
                    "timeout_secs",
                    "exceeds maximum limit of 7200 seconds (2 hours)",
                ));
            }
        }

        if self.validation.sample_window_chars == Some(0) {
            return Err(invalid("sample_window_chars", "must be greater than 0"));
        }

        let token_budgets = [
            ("tokens.lifecycle", self.tokens.lifecycle),
            ("tokens.analysis", self.tokens.analysis),
            ("tokens.framework", self.tokens.framework),
            ("tokens.batch", self.tokens.batch),
            ("tokens.narrative", self.tokens.narrative),
            ("tokens.review", self.tokens.review),
        ];
        for (key, value) in token_budgets {
            if value == Some(0) {
                return Err(invalid(key, "must be greater than 0"));
            }
        }

        if let Some(simulated) = &self.llm.simulated
            && simulated.fragment_chars == Some(0)
        {
            return Err(invalid("llm.simulated.fragment_chars", "must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::minimal_for_testing().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::minimal_for_testing();
        config.batching.batch_size = Some(0);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "batch_size"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("gemini".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = Config::minimal_for_testing();
        config.defaults.timeout_secs = Some(2);
        assert!(config.validate().is_err());
        config.defaults.timeout_secs = Some(60);
        assert!(config.validate().is_ok());
    }
}
