//! Facade for embedding the engine.
//!
//! Outside this crate, use [`GenerationHandle`]. It builds the model client,
//! checkpoint store and orchestrator from a [`Config`] and decides between a
//! fresh and a resumed run from the caller's [`StartMode`].
//!
//! ```rust,no_run
//! use syllabus_config::Config;
//! use syllabus_engine::{GenerationHandle, StartMode};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = GenerationHandle::from_config(Config::builder().provider("simulated").build()?)?;
//! let output = handle
//!     .run("Wound Care", StartMode::Resume, CancellationToken::new())
//!     .await?;
//! println!("{}", output.document);
//! # Ok(())
//! # }
//! ```

use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orchestrator::{GenerationOutput, PassOrchestrator};
use crate::progress::ProgressSink;
use crate::run::GenerationRun;
use crate::settings::EngineSettings;
use syllabus_checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
use syllabus_config::Config;
use syllabus_llm::{LlmBackend, ModelClient};
use syllabus_utils::error::{ConfigError, PipelineError};

/// How a run treats an existing checkpoint for its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Discard any checkpoint and run all stages.
    Fresh,
    /// Continue from the checkpoint when one exists, otherwise run all stages.
    #[default]
    Resume,
}

pub struct GenerationHandle {
    store: Arc<dyn CheckpointStore>,
    orchestrator: PassOrchestrator,
}

impl GenerationHandle {
    /// Handle using the configured provider and the file checkpoint store.
    ///
    /// # Errors
    ///
    /// `PipelineError::Config` when the provider cannot be constructed or the
    /// checkpoint directory is not valid UTF-8.
    pub fn from_config(config: Config) -> Result<Self, PipelineError> {
        let backend = syllabus_llm::from_config(&config).map_err(|e| {
            PipelineError::Config(ConfigError::InvalidValue {
                key: "llm.provider".to_string(),
                value: e.to_string(),
            })
        })?;

        let dir = Utf8PathBuf::from_path_buf(config.checkpoint_dir()).map_err(|path| {
            PipelineError::Config(ConfigError::InvalidValue {
                key: "checkpoint.dir".to_string(),
                value: path.display().to_string(),
            })
        })?;

        Ok(Self::with_parts(
            &config,
            backend,
            Arc::new(FileCheckpointStore::new(dir)),
        ))
    }

    /// Handle over an explicit backend and store.
    #[must_use]
    pub fn with_parts(
        config: &Config,
        backend: Arc<dyn LlmBackend>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let orchestrator = PassOrchestrator::new(
            ModelClient::new(backend),
            Arc::clone(&store),
            EngineSettings::from_config(config),
        );
        Self {
            store,
            orchestrator,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.orchestrator = self.orchestrator.with_progress(sink);
        self
    }

    /// # Errors
    ///
    /// Checkpoint store failures.
    pub fn has_checkpoint(&self, subject: &str) -> Result<bool, PipelineError> {
        Ok(self.store.has(subject)?)
    }

    /// # Errors
    ///
    /// Checkpoint store failures, including an unreadable snapshot.
    pub fn checkpoint(&self, subject: &str) -> Result<Option<Checkpoint>, PipelineError> {
        Ok(self.store.load(subject)?)
    }

    /// # Errors
    ///
    /// Checkpoint store failures.
    pub fn clear_checkpoint(&self, subject: &str) -> Result<(), PipelineError> {
        Ok(self.store.clear(subject)?)
    }

    /// Run the pipeline for `subject`.
    ///
    /// # Errors
    ///
    /// See [`PassOrchestrator::execute`].
    pub async fn run(
        &self,
        subject: &str,
        mode: StartMode,
        cancel: CancellationToken,
    ) -> Result<GenerationOutput, PipelineError> {
        let run = match mode {
            StartMode::Fresh => {
                self.store.clear(subject)?;
                GenerationRun::new(subject, cancel)
            }
            StartMode::Resume => match self.store.load(subject)? {
                Some(checkpoint) => {
                    info!(
                        subject = %subject,
                        last_complete_stage = %checkpoint.last_complete_stage,
                        "Resuming from checkpoint"
                    );
                    GenerationRun::from_checkpoint(checkpoint, cancel)?
                }
                None => GenerationRun::new(subject, cancel),
            },
        };
        self.orchestrator.execute(run).await
    }
}
