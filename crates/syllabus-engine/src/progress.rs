//! Progress reporting.
//!
//! Every status transition and every accepted stage-3 progress value reaches
//! the caller as a [`ProgressUpdate`] through a [`ProgressSink`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

use syllabus_utils::types::{StageId, StageStatus};

/// One progress notification.
///
/// `payload` is an open, stage-specific object. Known keys are `message`,
/// `progress` (0-100, stage 3 only), `batch`, `total_batches` and `restored`;
/// consumers must ignore keys they do not know.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub stage: StageId,
    pub status: StageStatus,
    pub payload: Value,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: StageId, status: StageStatus, payload: Value) -> Self {
        Self {
            stage,
            status,
            payload,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }

    #[must_use]
    pub fn progress(&self) -> Option<f64> {
        self.payload.get("progress").and_then(Value::as_f64)
    }
}

/// Receiver of progress updates.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update);
    }
}

/// Sink that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Build a payload object from `message` plus extra fields.
#[must_use]
pub fn payload(message: impl Into<String>, extra: &[(&str, Value)]) -> Value {
    let mut map = Map::new();
    map.insert("message".to_string(), Value::String(message.into()));
    for (key, value) in extra {
        map.insert((*key).to_string(), value.clone());
    }
    Value::Object(map)
}

/// Global maximum of a progress value shared by concurrent batches.
///
/// A candidate is accepted when it is greater than or equal to the current
/// maximum; anything lower is dropped. The emit callback runs while the
/// maximum is held, so accepted values reach the sink in non-decreasing order
/// even when offers race on different threads.
#[derive(Debug, Default)]
pub struct MonotonicProgress {
    max: Mutex<f64>,
}

impl MonotonicProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `candidate`; on acceptance record it and call `emit` with it.
    pub fn offer<F>(&self, candidate: f64, emit: F) -> bool
    where
        F: FnOnce(f64),
    {
        if !candidate.is_finite() {
            return false;
        }
        let mut max = self.max.lock().unwrap_or_else(PoisonError::into_inner);
        if candidate < *max {
            trace!(candidate, current = *max, "Progress offer below maximum");
            return false;
        }
        *max = candidate;
        emit(candidate);
        true
    }

    #[must_use]
    pub fn current(&self) -> f64 {
        *self.max.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
