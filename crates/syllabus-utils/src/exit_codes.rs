//! Exit codes for the syllabus CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Generation completed |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 70 | `UPSTREAM_FAILURE` | Model call failed |
//! | 75 | `CHECKPOINT_FAILURE` | Checkpoint could not be read or written |
//! | 130 | `CANCELLED` | Run cancelled by the user |

use crate::error::PipelineError;

/// Type-safe process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const INTERNAL: ExitCode = ExitCode(1);
    pub const CLI_ARGS: ExitCode = ExitCode(2);
    pub const UPSTREAM_FAILURE: ExitCode = ExitCode(70);
    pub const CHECKPOINT_FAILURE: ExitCode = ExitCode(75);
    pub const CANCELLED: ExitCode = ExitCode(130);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        Self(code)
    }
}

impl From<&PipelineError> for ExitCode {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => Self::CANCELLED,
            PipelineError::UpstreamFailure { .. } => Self::UPSTREAM_FAILURE,
            PipelineError::Checkpoint(_) => Self::CHECKPOINT_FAILURE,
            PipelineError::Config(_) => Self::CLI_ARGS,
            PipelineError::InvalidTransition { .. } => Self::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CheckpointError, LlmError};
    use crate::types::StageId;

    #[test]
    fn test_error_to_exit_code_mapping() {
        assert_eq!(ExitCode::from(&PipelineError::Cancelled), ExitCode::CANCELLED);
        let upstream = PipelineError::from_llm(StageId::Framework, LlmError::Transport("x".into()));
        assert_eq!(ExitCode::from(&upstream).as_i32(), 70);
        let checkpoint = PipelineError::Checkpoint(CheckpointError::Serialization("x".into()));
        assert_eq!(ExitCode::from(&checkpoint).as_i32(), 75);
    }
}
