//! Instrumented backend for tests.
//!
//! `RecordingBackend` answers like [`SimulatedBackend`] and records every call
//! it receives. Tests can inject failures per label, delay individual content
//! batches, and trip a cancellation token when a given label is dispatched.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::LlmError;
use crate::simulated_backend::SimulatedBackend;
use crate::types::{FragmentStream, LlmBackend, LlmInvocation, LlmResult};

/// One call observed by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub label: String,
    pub streaming: bool,
    pub batch_index: Option<usize>,
}

#[derive(Default)]
pub struct RecordingBackend {
    inner: SimulatedBackend,
    calls: Mutex<Vec<RecordedCall>>,
    failures: HashMap<String, LlmError>,
    batch_delays: HashMap<usize, Duration>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl RecordingBackend {
    #[must_use]
    pub fn new(inner: SimulatedBackend) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Every call with `label` fails with `error`.
    #[must_use]
    pub fn fail_on(mut self, label: impl Into<String>, error: LlmError) -> Self {
        self.failures.insert(label.into(), error);
        self
    }

    /// Hold the content batch `batch_index` for `delay` before it streams.
    #[must_use]
    pub fn delay_batch(mut self, batch_index: usize, delay: Duration) -> Self {
        self.batch_delays.insert(batch_index, delay);
        self
    }

    /// Cancel `token` when the first call with `label` arrives.
    #[must_use]
    pub fn cancel_on(mut self, label: impl Into<String>, token: CancellationToken) -> Self {
        self.cancel_on = Some((label.into(), token));
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.label).collect()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn count_label(&self, label: &str) -> usize {
        self.calls().iter().filter(|c| c.label == label).count()
    }

    async fn observe(&self, inv: &LlmInvocation, streaming: bool) -> Result<(), LlmError> {
        let batch_index = inv.metadata_usize("batch_index");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                label: inv.label.clone(),
                streaming,
                batch_index,
            });

        if let Some((label, token)) = &self.cancel_on
            && *label == inv.label
        {
            token.cancel();
        }

        if let Some(err) = self.failures.get(&inv.label) {
            return Err(err.clone());
        }

        if inv.label == "content"
            && let Some(delay) = batch_index.and_then(|i| self.batch_delays.get(&i))
        {
            tokio::time::sleep(*delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl LlmBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.observe(&inv, false).await?;
        self.inner.invoke(inv).await
    }

    async fn invoke_streaming(&self, inv: LlmInvocation) -> Result<FragmentStream, LlmError> {
        self.observe(&inv, true).await?;
        self.inner.invoke_streaming(inv).await
    }
}
