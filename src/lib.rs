//! syllabus - resumable, rate-limited curriculum generation
//!
//! One subject goes in; one Markdown curriculum document comes out. The
//! pipeline runs four LLM-backed stages:
//!
//! 1. **Analysis**: domain, practitioner role, a three-phase lifecycle and
//!    the ordered concept list
//! 2. **Framework**: the decision framework section
//! 3. **Content**: one block per concept, written in batches with a bounded
//!    number in flight, plus the narrative sections
//! 4. **Validation**: local structural checks, a remote review and
//!    section-level fixes
//!
//! Each completed stage is checkpointed, so an interrupted run resumes at the
//! first incomplete stage.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! syllabus generate "Wound Care" --output wound-care.md
//! syllabus generate "Wound Care" --dry-run
//! syllabus checkpoint status "Wound Care"
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use syllabus::{Config, GenerationHandle, StartMode};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder().provider("simulated").build()?;
//! let handle = GenerationHandle::from_config(config)?;
//! let output = handle
//!     .run("Wound Care", StartMode::Resume, CancellationToken::new())
//!     .await?;
//! println!("{}", output.document);
//! # Ok(())
//! # }
//! ```
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Internal error |
//! | 2 | Invalid arguments or configuration |
//! | 70 | A model call failed or returned unusable content |
//! | 75 | Checkpoint storage failure |
//! | 130 | Cancelled |

pub mod cli;

pub use syllabus_checkpoint::{
    Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
pub use syllabus_config::{CliArgs, Config, ConfigBuilder};
pub use syllabus_engine::{
    GenerationHandle, GenerationOutput, PassOrchestrator, ProgressSink, ProgressUpdate,
    ScheduleReport, StageState, StartMode,
};
pub use syllabus_llm::{LlmBackend, ModelClient, SimulatedBackend};
pub use syllabus_utils::error::{ConfigError, LlmError, PipelineError, UserFriendlyError};
pub use syllabus_utils::exit_codes::ExitCode;
pub use syllabus_utils::types::{Lifecycle, Stage1Result, StageId, StageStatus};
pub use syllabus_validation::ValidationResult;
