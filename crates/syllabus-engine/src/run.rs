//! Per-run state: stage statuses and accumulated outputs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use syllabus_checkpoint::{Checkpoint, StageOutputs};
use syllabus_utils::error::{CheckpointError, PipelineError};
use syllabus_utils::types::{StageId, StageStatus};

/// Status and timing of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageState {
    pub stage: StageId,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Completed by an earlier run and loaded from a checkpoint.
    pub restored: bool,
}

impl StageState {
    #[must_use]
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            status: StageStatus::Queued,
            started_at: None,
            completed_at: None,
            restored: false,
        }
    }

    /// Move to `to`, rejecting any transition that is not forward along
    /// `queued -> in_progress [-> fixing] -> complete`.
    ///
    /// `fixing` is reachable only by the validation stage.
    ///
    /// # Errors
    ///
    /// `PipelineError::InvalidTransition` for any other move.
    pub fn advance(&mut self, to: StageStatus) -> Result<(), PipelineError> {
        use StageStatus::{Complete, Fixing, InProgress, Queued};

        let allowed = match (self.status, to) {
            (Queued, InProgress) | (InProgress, Complete) => true,
            (InProgress, Fixing) | (Fixing, Complete) => self.stage == StageId::Validation,
            _ => false,
        };
        if !allowed {
            return Err(PipelineError::InvalidTransition {
                stage: self.stage,
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        let now = Utc::now();
        match to {
            InProgress => self.started_at = Some(now),
            Complete => self.completed_at = Some(now),
            Queued | Fixing => {}
        }
        self.status = to;
        Ok(())
    }

    /// Wall-clock duration in milliseconds once both timestamps are set.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u128> {
        let (start, end) = (self.started_at?, self.completed_at?);
        u128::try_from((end - start).num_milliseconds()).ok()
    }

    fn restore(&mut self) {
        self.status = StageStatus::Complete;
        self.restored = true;
    }
}

/// One generation attempt for a subject.
///
/// Owned by the orchestrator while it executes; outputs are handed to the
/// caller only through the final result.
#[derive(Debug)]
pub struct GenerationRun {
    subject: String,
    stages: [StageState; 4],
    outputs: StageOutputs,
    cancel: CancellationToken,
    resumed_from: Option<StageId>,
}

impl GenerationRun {
    #[must_use]
    pub fn new(subject: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            subject: subject.into(),
            stages: StageId::ALL.map(StageState::new),
            outputs: StageOutputs::default(),
            cancel,
            resumed_from: None,
        }
    }

    /// Run seeded from a checkpoint; stages it covers start out complete.
    ///
    /// # Errors
    ///
    /// `CheckpointError::Corrupt` when the snapshot is inconsistent.
    pub fn from_checkpoint(
        checkpoint: Checkpoint,
        cancel: CancellationToken,
    ) -> Result<Self, PipelineError> {
        checkpoint
            .check_consistency()
            .map_err(|reason| CheckpointError::Corrupt {
                subject: checkpoint.subject.clone(),
                reason,
            })?;

        let mut run = Self::new(checkpoint.subject, cancel);
        for state in &mut run.stages {
            if state.stage <= checkpoint.last_complete_stage {
                state.restore();
            }
        }
        run.outputs = checkpoint.outputs;
        run.resumed_from = checkpoint.last_complete_stage.next();
        Ok(run)
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn stage(&self, stage: StageId) -> &StageState {
        &self.stages[usize::from(stage.index() - 1)]
    }

    pub(crate) fn stage_mut(&mut self, stage: StageId) -> &mut StageState {
        &mut self.stages[usize::from(stage.index() - 1)]
    }

    #[must_use]
    pub fn stages(&self) -> &[StageState] {
        &self.stages
    }

    #[must_use]
    pub fn outputs(&self) -> &StageOutputs {
        &self.outputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut StageOutputs {
        &mut self.outputs
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// First stage this run had to execute when it was seeded from a checkpoint.
    #[must_use]
    pub fn resumed_from(&self) -> Option<StageId> {
        self.resumed_from
    }

    /// Whether `stage` was completed before this run started.
    #[must_use]
    pub fn is_restored(&self, stage: StageId) -> bool {
        self.stage(stage).restored
    }

    /// Move `stage` to in-progress once its predecessor is complete.
    pub(crate) fn begin(&mut self, stage: StageId) -> Result<(), PipelineError> {
        if let Some(previous) = stage.index().checked_sub(1).and_then(StageId::from_index) {
            let prev = self.stage(previous);
            if prev.status != StageStatus::Complete {
                return Err(PipelineError::InvalidTransition {
                    stage,
                    from: format!("{previous} {}", prev.status),
                    to: StageStatus::InProgress.to_string(),
                });
            }
        }
        self.stage_mut(stage).advance(StageStatus::InProgress)
    }

    /// Snapshot of everything completed through `stage`.
    pub(crate) fn checkpoint(&self, stage: StageId) -> Checkpoint {
        Checkpoint::new(self.subject.clone(), stage, self.outputs.clone())
    }

    pub(crate) fn into_stages(self) -> Vec<StageState> {
        self.stages.into()
    }
}
