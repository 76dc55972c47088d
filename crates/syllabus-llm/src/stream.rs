//! Fragment aggregation for streamed calls.

use futures_util::StreamExt;

use crate::LlmError;
use crate::types::FragmentStream;

/// Concatenates streamed fragments, exposing the running length.
///
/// Holds only what the stream has produced so far. On any error the partial
/// text is dropped with the aggregator; a failed stream never yields a
/// partial result.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    text: String,
    fragments: usize,
}

impl StreamAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment, returning the new total length in bytes.
    pub fn push(&mut self, fragment: &str) -> usize {
        self.text.push_str(fragment);
        self.fragments += 1;
        self.text.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Drain `stream` to completion, calling `on_fragment` with the running
    /// length after each fragment.
    ///
    /// # Errors
    ///
    /// The first error item of the stream, including `LlmError::Cancelled`.
    pub async fn collect<F>(
        mut self,
        mut stream: FragmentStream,
        mut on_fragment: F,
    ) -> Result<String, LlmError>
    where
        F: FnMut(usize) + Send,
    {
        while let Some(item) = stream.next().await {
            let fragment = item?;
            let len = self.push(&fragment);
            on_fragment(len);
        }
        Ok(self.into_text())
    }
}
