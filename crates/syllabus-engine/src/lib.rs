//! Generation engine for syllabus
//!
//! Runs the four-stage pipeline (analysis, framework, content, validation)
//! for one subject. Stage 3 fans out through the [`BatchScheduler`] with a
//! bounded concurrency window; its progress is reported through a
//! [`MonotonicProgress`] so observers never see it move backwards. Every
//! completed stage is checkpointed, and a run can resume at the first
//! incomplete stage.
//!
//! Outside this crate, use [`GenerationHandle`].

mod assembly;
mod cleanup;
mod handle;
mod orchestrator;
mod progress;
mod prompts;
mod run;
mod scheduler;
mod settings;
mod stages;

pub use assembly::{DOMAIN_ANALYSIS, assemble_document};
pub use cleanup::strip_boilerplate;
pub use handle::{GenerationHandle, StartMode};
pub use orchestrator::{GenerationOutput, PassOrchestrator};
pub use progress::{MonotonicProgress, NoopProgress, ProgressSink, ProgressUpdate, payload};
pub use run::{GenerationRun, StageState};
pub use scheduler::{Batch, BatchScheduler, ScheduleReport, ScheduledOutput, plan_batches};
pub use settings::EngineSettings;
