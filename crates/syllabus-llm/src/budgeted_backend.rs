//! Budgeted backend wrapper for call limiting
//!
//! Wraps any `LlmBackend` and enforces a per-process cap on invocations,
//! counting request/response and streamed calls alike.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use crate::LlmError;
use crate::types::{FragmentStream, LlmBackend, LlmInvocation, LlmResult};

/// Environment variable overriding the configured budget
pub(crate) const BUDGET_ENV_VAR: &str = "SYLLABUS_LLM_BUDGET";

/// A wrapper around an `LlmBackend` that enforces a budget limit on invocations.
///
/// The budget tracks attempted calls, not successful requests: a failed call
/// still consumes its slot.
pub struct BudgetedBackend {
    inner: Box<dyn LlmBackend>,
    calls: AtomicU32,
    limit: u32,
}

impl BudgetedBackend {
    #[must_use]
    pub fn new(inner: Box<dyn LlmBackend>, limit: u32) -> Self {
        debug!(limit, "Creating BudgetedBackend");
        Self {
            inner,
            calls: AtomicU32::new(0),
            limit,
        }
    }

    /// Resolve the limit with precedence env var > config.
    ///
    /// Returns `None` when neither is set, meaning no wrapping is needed.
    #[must_use]
    pub fn resolve_limit(config_budget: Option<u32>) -> Option<u32> {
        let from_env = std::env::var(BUDGET_ENV_VAR)
            .ok()
            .and_then(|s| s.parse::<u32>().ok());
        if let Some(limit) = from_env {
            debug!(limit, "Using budget limit from {}", BUDGET_ENV_VAR);
        }
        from_env.or(config_budget)
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Take a budget slot, failing once the limit is reached.
    fn reserve(&self, label: &str) -> Result<(), LlmError> {
        let current = self.calls.fetch_add(1, Ordering::SeqCst);
        if current >= self.limit {
            let attempted = current + 1;
            warn!(limit = self.limit, attempted, label, "Budget limit exceeded");
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }
        debug!(call_count = current + 1, limit = self.limit, label, "Budget check passed");
        Ok(())
    }
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.reserve(&inv.label)?;
        self.inner.invoke(inv).await
    }

    async fn invoke_streaming(&self, inv: LlmInvocation) -> Result<FragmentStream, LlmError> {
        self.reserve(&inv.label)?;
        self.inner.invoke_streaming(inv).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use futures_util::stream;
    use std::time::Duration;

    struct MockFailureBackend;

    #[async_trait]
    impl LlmBackend for MockFailureBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            Err(LlmError::Transport("mock failure".to_string()))
        }

        async fn invoke_streaming(&self, _inv: LlmInvocation) -> Result<FragmentStream, LlmError> {
            Ok(Box::pin(stream::iter(vec![Ok("x".to_string())])))
        }
    }

    fn invocation() -> LlmInvocation {
        LlmInvocation::new("s", "content", Duration::from_secs(5), vec![Message::user("m")])
    }

    #[tokio::test]
    async fn test_failed_calls_consume_budget() {
        let backend = BudgetedBackend::new(Box::new(MockFailureBackend), 2);

        assert!(matches!(
            backend.invoke(invocation()).await,
            Err(LlmError::Transport(_))
        ));
        assert!(backend.invoke_streaming(invocation()).await.is_ok());
        assert_eq!(backend.call_count(), 2);

        let err = backend.invoke(invocation()).await.unwrap_err();
        assert_eq!(err, LlmError::BudgetExceeded {
            limit: 2,
            attempted: 3
        });
        assert!(backend.invoke_streaming(invocation()).await.is_err());
        assert_eq!(backend.limit(), 2);
    }
}
