//! Windowed batch scheduling for the content stage.
//!
//! N items are split into `ceil(N / batch_size)` contiguous batches. Up to
//! `window` batches run concurrently; the scheduler waits for the whole
//! window to settle, pauses for `inter_window_delay`, then launches the next
//! window. Outputs are assembled by batch index, never by completion order.

use futures_util::future::try_join_all;
use serde::Serialize;
use std::future::Future;
use std::ops::Range;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use syllabus_llm::LlmError;

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0-based position in the plan.
    pub index: usize,
    /// Half-open range of item indices.
    pub range: Range<usize>,
    pub total_batches: usize,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Overall progress this batch reports while streaming:
    /// `(index + 0.5) / total_batches * 100`.
    #[must_use]
    pub fn streaming_progress(&self) -> f64 {
        if self.total_batches == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let value = (self.index as f64 + 0.5) / self.total_batches as f64 * 100.0;
        value
    }
}

/// What a scheduler run did, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    pub batches: usize,
    pub windows: usize,
    /// Inter-window pauses actually slept.
    pub delays: usize,
}

/// Batch outputs in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledOutput {
    pub outputs: Vec<String>,
    pub report: ScheduleReport,
}

impl ScheduledOutput {
    /// Concatenation of all outputs in batch order.
    #[must_use]
    pub fn concatenated(&self) -> String {
        self.outputs.concat()
    }
}

/// Split `total` items into contiguous batches of `batch_size`.
///
/// A zero `batch_size` is treated as one.
#[must_use]
pub fn plan_batches(total: usize, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    let count = total.div_ceil(size);
    (0..count)
        .map(|index| Batch {
            index,
            range: index * size..((index + 1) * size).min(total),
            total_batches: count,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    window: usize,
    inter_window_delay: Duration,
}

impl BatchScheduler {
    /// Zero `batch_size` or `window` are raised to one.
    #[must_use]
    pub fn new(batch_size: usize, window: usize, inter_window_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            window: window.max(1),
            inter_window_delay,
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    #[must_use]
    pub fn plan(&self, total: usize) -> Vec<Batch> {
        plan_batches(total, self.batch_size)
    }

    /// Run `run_batch` over the plan for `total` items.
    ///
    /// The first failing batch fails the whole run; its window siblings are
    /// dropped without being awaited. Cancellation is checked before each
    /// window and during the inter-window pause.
    ///
    /// # Errors
    ///
    /// `LlmError::Cancelled` when `cancel` fires at a window boundary, or the
    /// first error returned by a batch.
    pub async fn run<F, Fut>(
        &self,
        total: usize,
        cancel: &CancellationToken,
        mut run_batch: F,
    ) -> Result<ScheduledOutput, LlmError>
    where
        F: FnMut(Batch) -> Fut,
        Fut: Future<Output = Result<String, LlmError>>,
    {
        let plan = self.plan(total);
        let mut outputs: Vec<Option<String>> = vec![None; plan.len()];
        let mut report = ScheduleReport {
            batches: plan.len(),
            ..ScheduleReport::default()
        };

        let windows: Vec<&[Batch]> = plan.chunks(self.window).collect();
        info!(
            items = total,
            batches = plan.len(),
            windows = windows.len(),
            window = self.window,
            "Scheduling content batches"
        );

        for (window_index, window) in windows.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            if window_index > 0 && !self.inter_window_delay.is_zero() {
                debug!(
                    delay_ms = self.inter_window_delay.as_millis(),
                    next_window = window_index,
                    "Pausing between windows"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(LlmError::Cancelled),
                    () = tokio::time::sleep(self.inter_window_delay) => {}
                }
                report.delays += 1;
            }

            debug!(
                window = window_index,
                batches = ?window.iter().map(|b| b.index).collect::<Vec<_>>(),
                "Dispatching window"
            );
            let pending: Vec<Fut> = window.iter().cloned().map(&mut run_batch).collect();
            let texts = try_join_all(pending).await?;
            report.windows += 1;

            for (batch, text) in window.iter().zip(texts) {
                outputs[batch.index] = Some(text);
            }
        }

        Ok(ScheduledOutput {
            outputs: outputs.into_iter().map(Option::unwrap_or_default).collect(),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_twelve_items_make_two_batches() {
        let plan = plan_batches(12, 10);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].range, 0..10);
        assert_eq!(plan[1].range, 10..12);
        assert!((plan[0].streaming_progress() - 25.0).abs() < f64::EPSILON);
        assert!((plan[1].streaming_progress() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_plan() {
        assert!(plan_batches(0, 10).is_empty());
    }

    proptest! {
        #[test]
        fn prop_plan_covers_range_exactly(total in 0usize..500, batch_size in 1usize..40) {
            let plan = plan_batches(total, batch_size);
            prop_assert_eq!(plan.len(), total.div_ceil(batch_size));

            let mut next = 0;
            for (i, batch) in plan.iter().enumerate() {
                prop_assert_eq!(batch.index, i);
                prop_assert_eq!(batch.range.start, next);
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() <= batch_size);
                next = batch.range.end;
            }
            prop_assert_eq!(next, total);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_window_incurs_no_delay() {
        let scheduler = BatchScheduler::new(10, 2, Duration::from_millis(2000));
        let started = Instant::now();
        let out = scheduler
            .run(12, &CancellationToken::new(), |b| async move {
                Ok(format!("[{}]", b.index))
            })
            .await
            .unwrap();

        assert_eq!(out.concatenated(), "[0][1]");
        assert_eq!(
            out.report,
            ScheduleReport {
                batches: 2,
                windows: 1,
                delays: 0
            }
        );
        assert!(started.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_are_separated_by_delay() {
        let scheduler = BatchScheduler::new(10, 2, Duration::from_millis(2000));
        let started = Instant::now();
        let out = scheduler
            .run(45, &CancellationToken::new(), |b| async move {
                Ok(b.index.to_string())
            })
            .await
            .unwrap();

        assert_eq!(out.outputs, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(out.report.windows, 3);
        assert_eq!(out.report.delays, 2);
        assert!(started.elapsed() >= Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_assembly_ignores_completion_order() {
        let scheduler = BatchScheduler::new(1, 4, Duration::ZERO);
        let finished = Mutex::new(Vec::new());
        let finished_ref = &finished;
        let out = scheduler
            .run(4, &CancellationToken::new(), move |b| async move {
                let wait = 40 - 10 * b.index as u64;
                tokio::time::sleep(Duration::from_millis(wait)).await;
                finished_ref.lock().unwrap().push(b.index);
                Ok(format!("<{}>", b.index))
            })
            .await
            .unwrap();

        assert_eq!(finished.into_inner().unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(out.concatenated(), "<0><1><2><3>");
    }

    #[tokio::test]
    async fn test_first_failure_fails_the_run() {
        let scheduler = BatchScheduler::new(2, 2, Duration::ZERO);
        let dispatched = Mutex::new(Vec::new());
        let dispatched_ref = &dispatched;
        let err = scheduler
            .run(10, &CancellationToken::new(), move |b| async move {
                dispatched_ref.lock().unwrap().push(b.index);
                if b.index == 1 {
                    Err(LlmError::ProviderOutage("503".into()))
                } else {
                    Ok(String::new())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ProviderOutage(_)));
        // the second window is never dispatched
        assert_eq!(dispatched.into_inner().unwrap(), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_stops_before_next_window() {
        let scheduler = BatchScheduler::new(1, 1, Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let calls = Mutex::new(0usize);
        let calls_ref = &calls;
        let trigger = cancel.clone();
        let err = scheduler
            .run(3, &cancel, move |_| {
                let trigger = trigger.clone();
                async move {
                    *calls_ref.lock().unwrap() += 1;
                    trigger.cancel();
                    Ok(String::new())
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err, LlmError::Cancelled);
        assert_eq!(calls.into_inner().unwrap(), 1);
    }
}
