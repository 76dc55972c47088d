//! Cancellation-aware front end over an `LlmBackend`.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::LlmError;
use crate::types::{FragmentStream, LlmBackend, LlmInvocation};

/// The model client every stage talks to.
///
/// Both call shapes fail with `LlmError::Cancelled` without dispatching when
/// the token is already signalled, and race the backend against the token
/// while in flight. Streams are wrapped so the token is re-checked before
/// each fragment is yielded. No retry happens here.
#[derive(Clone)]
pub struct ModelClient {
    backend: Arc<dyn LlmBackend>,
}

impl ModelClient {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn provider(&self) -> &'static str {
        self.backend.name()
    }

    /// Request/response call returning the full text.
    ///
    /// # Errors
    ///
    /// `LlmError::Cancelled` if `cancel` is or becomes signalled, otherwise
    /// whatever the backend returns.
    pub async fn invoke(
        &self,
        inv: LlmInvocation,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        if cancel.is_cancelled() {
            debug!(label = %inv.label, "Cancelled before dispatch");
            return Err(LlmError::Cancelled);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LlmError::Cancelled),
            result = self.backend.invoke(inv) => result.map(|r| r.raw_response),
        }
    }

    /// Streamed call returning a cancellable fragment stream.
    ///
    /// # Errors
    ///
    /// `LlmError::Cancelled` if `cancel` is signalled before the stream is
    /// established; stream items carry later failures.
    pub async fn invoke_streaming(
        &self,
        inv: LlmInvocation,
        cancel: &CancellationToken,
    ) -> Result<FragmentStream, LlmError> {
        if cancel.is_cancelled() {
            debug!(label = %inv.label, "Cancelled before dispatch");
            return Err(LlmError::Cancelled);
        }

        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = self.backend.invoke_streaming(inv) => result?,
        };

        Ok(cancellable(stream, cancel.clone()))
    }
}

/// Yield `Cancelled` and stop as soon as `cancel` fires, checking before
/// every fragment and while waiting for the next one.
fn cancellable(inner: FragmentStream, cancel: CancellationToken) -> FragmentStream {
    let stream = futures_util::stream::unfold(Some((inner, cancel)), |state| async move {
        let (mut inner, cancel) = state?;
        if cancel.is_cancelled() {
            return Some((Err(LlmError::Cancelled), None));
        }

        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => Some(Err(LlmError::Cancelled)),
            item = inner.next() => item,
        };

        match next {
            Some(Ok(_)) if cancel.is_cancelled() => Some((Err(LlmError::Cancelled), None)),
            Some(Ok(fragment)) => Some((Ok(fragment), Some((inner, cancel)))),
            Some(Err(e)) => Some((Err(e), None)),
            None => None,
        }
    });
    stream.boxed()
}
