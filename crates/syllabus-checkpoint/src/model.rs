use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use syllabus_utils::types::{Stage1Result, StageId};
use syllabus_validation::ValidationResult;

/// Snapshot format version. Bump when the layout changes incompatibly.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Outputs of every completed stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutputs {
    pub stage1: Option<Stage1Result>,
    pub stage2: Option<String>,
    /// Stage-3 content; after validation this is the corrected text.
    pub stage3: Option<String>,
    pub validation: Option<ValidationResult>,
}

impl StageOutputs {
    /// Whether the output of `stage` is present.
    #[must_use]
    pub fn has(&self, stage: StageId) -> bool {
        match stage {
            StageId::Analysis => self.stage1.is_some(),
            StageId::Framework => self.stage2.is_some(),
            StageId::Content => self.stage3.is_some(),
            StageId::Validation => self.validation.is_some(),
        }
    }
}

/// Resumability state for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub subject: String,
    pub last_complete_stage: StageId,
    pub outputs: StageOutputs,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        last_complete_stage: StageId,
        outputs: StageOutputs,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            subject: subject.into(),
            last_complete_stage,
            outputs,
            saved_at: Utc::now(),
        }
    }

    /// First stage a resumed run must execute, `None` when all are complete.
    #[must_use]
    pub fn first_incomplete_stage(&self) -> Option<StageId> {
        self.last_complete_stage.next()
    }

    /// Check the snapshot is usable: known version and every output up to
    /// `last_complete_stage` present.
    ///
    /// # Errors
    ///
    /// A human-readable reason when the snapshot is inconsistent.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.version != CHECKPOINT_VERSION {
            return Err(format!(
                "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                self.version
            ));
        }
        for stage in StageId::ALL {
            if stage > self.last_complete_stage {
                break;
            }
            if !self.outputs.has(stage) {
                return Err(format!(
                    "stage {} is marked complete but its output is missing",
                    stage.index()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs_through_framework() -> StageOutputs {
        StageOutputs {
            stage1: Some(Stage1Result {
                domain: "d".into(),
                role: "r".into(),
                lifecycle: syllabus_utils::types::Lifecycle::fallback(),
                concepts: vec!["a".into()],
                excluded_actions: vec![],
                source_verification: String::new(),
            }),
            stage2: Some("## DECISION FRAMEWORK".into()),
            ..StageOutputs::default()
        }
    }

    #[test]
    fn test_first_incomplete_stage() {
        let cp = Checkpoint::new("s", StageId::Framework, outputs_through_framework());
        assert_eq!(cp.first_incomplete_stage(), Some(StageId::Content));
        assert!(cp.check_consistency().is_ok());
    }

    #[test]
    fn test_missing_output_is_inconsistent() {
        let cp = Checkpoint::new("s", StageId::Content, outputs_through_framework());
        let reason = cp.check_consistency().unwrap_err();
        assert!(reason.contains("stage 3"));
    }

    #[test]
    fn test_unknown_version_is_inconsistent() {
        let mut cp = Checkpoint::new("s", StageId::Analysis, outputs_through_framework());
        cp.version = 99;
        assert!(cp.check_consistency().is_err());
    }
}
