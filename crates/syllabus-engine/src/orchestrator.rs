//! Pass orchestrator: runs the four stages in order over a [`GenerationRun`].
//!
//! Each stage moves `queued -> in_progress -> complete` (validation may pass
//! through `fixing`). After every completion the run's outputs are saved to
//! the checkpoint store before the next stage starts. Stages restored from a
//! checkpoint are reported and skipped without any model call.

use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{Instrument, info, warn};

use crate::assembly::assemble_document;
use crate::progress::{NoopProgress, ProgressSink, ProgressUpdate, payload};
use crate::run::{GenerationRun, StageState};
use crate::scheduler::ScheduleReport;
use crate::settings::EngineSettings;
use crate::stages::{self, StageContext};
use syllabus_checkpoint::CheckpointStore;
use syllabus_llm::ModelClient;
use syllabus_utils::error::PipelineError;
use syllabus_utils::logging::{
    log_stage_complete, log_stage_error, log_stage_skipped, log_stage_start, stage_span,
};
use syllabus_utils::types::{Stage1Result, StageId, StageStatus};
use syllabus_validation::{HeadingRegexPatcher, SectionPatcher, ValidationResult};

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    pub subject: String,
    pub document: String,
    pub validation: ValidationResult,
    pub stages: Vec<StageState>,
    /// `None` when stage 3 was restored from a checkpoint.
    pub schedule: Option<ScheduleReport>,
    pub resumed_from: Option<StageId>,
}

pub struct PassOrchestrator {
    client: ModelClient,
    store: Arc<dyn CheckpointStore>,
    settings: EngineSettings,
    sink: Arc<dyn ProgressSink>,
    patcher: Arc<dyn SectionPatcher>,
}

impl PassOrchestrator {
    #[must_use]
    pub fn new(
        client: ModelClient,
        store: Arc<dyn CheckpointStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            client,
            store,
            settings,
            sink: Arc::new(NoopProgress),
            patcher: Arc::new(HeadingRegexPatcher),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_patcher(mut self, patcher: Arc<dyn SectionPatcher>) -> Self {
        self.patcher = patcher;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Execute every stage not already complete in `run`.
    ///
    /// The checkpoint is cleared once the document is assembled; a failed
    /// clear is logged and does not fail the run.
    ///
    /// # Errors
    ///
    /// `PipelineError::Cancelled` when the run's token fires, otherwise the
    /// first stage or checkpoint failure. Nothing is retried.
    pub async fn execute(&self, mut run: GenerationRun) -> Result<GenerationOutput, PipelineError> {
        let subject = run.subject().to_string();
        let cancel = run.cancel_token().clone();

        for stage in StageId::ALL {
            if run.is_restored(stage) {
                log_stage_skipped(&subject, stage);
                self.report(
                    stage,
                    StageStatus::Complete,
                    payload("Restored from checkpoint", &[("restored", json!(true))]),
                );
            } else {
                self.report(stage, StageStatus::Queued, payload("Queued", &[]));
            }
        }

        let ctx = StageContext {
            subject: &subject,
            client: &self.client,
            settings: &self.settings,
            cancel: &cancel,
            sink: self.sink.as_ref(),
        };

        let stage1 = match run.outputs().stage1.clone() {
            Some(stage1) => stage1,
            None => {
                self.begin(&mut run, StageId::Analysis)?;
                let stage1 = stages::analysis::run(ctx)
                    .instrument(stage_span(&subject, StageId::Analysis))
                    .await
                    .map_err(|e| self.failed(&run, StageId::Analysis, e))?;
                run.outputs_mut().stage1 = Some(stage1.clone());
                self.complete(
                    &mut run,
                    StageId::Analysis,
                    &[
                        ("concepts", json!(stage1.concepts.len())),
                        ("role", json!(stage1.role)),
                    ],
                )?;
                stage1
            }
        };

        let framework = match run.outputs().stage2.clone() {
            Some(framework) => framework,
            None => {
                self.begin(&mut run, StageId::Framework)?;
                let framework = stages::framework::run(ctx, &stage1)
                    .instrument(stage_span(&subject, StageId::Framework))
                    .await
                    .map_err(|e| self.failed(&run, StageId::Framework, e))?;
                run.outputs_mut().stage2 = Some(framework.clone());
                self.complete(&mut run, StageId::Framework, &[])?;
                framework
            }
        };

        let mut schedule = None;
        let mut content = match run.outputs().stage3.clone() {
            Some(content) => content,
            None => {
                self.begin(&mut run, StageId::Content)?;
                let output = stages::content::run(ctx, &stage1, &framework)
                    .instrument(stage_span(&subject, StageId::Content))
                    .await
                    .map_err(|e| self.failed(&run, StageId::Content, e))?;
                run.outputs_mut().stage3 = Some(output.text.clone());
                self.complete(
                    &mut run,
                    StageId::Content,
                    &[
                        ("batches", json!(output.report.batches)),
                        ("windows", json!(output.report.windows)),
                    ],
                )?;
                schedule = Some(output.report);
                output.text
            }
        };

        let validation = match run.outputs().validation.clone() {
            Some(validation) => validation,
            None => {
                let (validation, corrected) =
                    self.validate(&mut run, ctx, &stage1, &content).await?;
                content = corrected;
                validation
            }
        };

        let document = assemble_document(&subject, &stage1, &framework, &content);
        if let Err(e) = self.store.clear(&subject) {
            warn!(
                subject = %subject,
                error = %e,
                "Failed to clear checkpoint after successful run"
            );
        }
        info!(
            subject = %subject,
            chars = document.len(),
            completeness = validation.completeness,
            "Generation complete"
        );

        Ok(GenerationOutput {
            subject,
            document,
            validation,
            schedule,
            resumed_from: run.resumed_from(),
            stages: run.into_stages(),
        })
    }

    /// Stage 4, including the `fixing` sub-state.
    async fn validate(
        &self,
        run: &mut GenerationRun,
        ctx: StageContext<'_>,
        stage1: &Stage1Result,
        content: &str,
    ) -> Result<(ValidationResult, String), PipelineError> {
        let stage = StageId::Validation;
        self.begin(run, stage)?;

        let mut validation = stages::validation::assess(ctx, stage1, content)
            .instrument(stage_span(ctx.subject, stage))
            .await
            .map_err(|e| self.failed(run, stage, e))?;

        let mut corrected = content.to_string();
        if validation.has_fixes() {
            run.stage_mut(stage).advance(StageStatus::Fixing)?;
            self.report(
                stage,
                StageStatus::Fixing,
                payload(
                    format!("Applying {} section fix(es)", validation.fixes.len()),
                    &[("fixes", json!(validation.fixes.keys().collect::<Vec<_>>()))],
                ),
            );
            corrected = stages::validation::apply(self.patcher.as_ref(), content, &mut validation);
        }

        run.outputs_mut().stage3 = Some(corrected.clone());
        run.outputs_mut().validation = Some(validation.clone());
        self.complete(
            run,
            stage,
            &[
                ("completeness", json!(validation.completeness)),
                ("found_concepts", json!(validation.found_concepts)),
                ("expected_concepts", json!(validation.expected_concepts)),
                ("fixes_applied", json!(validation.fixes_applied)),
            ],
        )?;
        Ok((validation, corrected))
    }

    fn begin(&self, run: &mut GenerationRun, stage: StageId) -> Result<(), PipelineError> {
        if run.cancel_token().is_cancelled() {
            info!(subject = %run.subject(), stage = %stage, "Cancelled before stage dispatch");
            return Err(PipelineError::Cancelled);
        }
        run.begin(stage)?;
        log_stage_start(run.subject(), stage);
        self.report(
            stage,
            StageStatus::InProgress,
            payload(format!("Stage {} started", stage.index()), &[]),
        );
        Ok(())
    }

    /// Mark `stage` complete and persist the run before returning.
    fn complete(
        &self,
        run: &mut GenerationRun,
        stage: StageId,
        extra: &[(&str, Value)],
    ) -> Result<(), PipelineError> {
        run.stage_mut(stage).advance(StageStatus::Complete)?;
        self.store.save(&run.checkpoint(stage))?;

        let state = run.stage(stage);
        log_stage_complete(run.subject(), stage, state.duration_ms().unwrap_or_default());
        self.report(
            stage,
            StageStatus::Complete,
            payload(format!("Stage {} complete", stage.index()), extra),
        );
        Ok(())
    }

    fn failed(&self, run: &GenerationRun, stage: StageId, err: PipelineError) -> PipelineError {
        let elapsed = run
            .stage(stage)
            .started_at
            .map(|start| (chrono::Utc::now() - start).num_milliseconds())
            .and_then(|ms| u128::try_from(ms).ok())
            .unwrap_or_default();
        if err.is_cancelled() {
            info!(subject = %run.subject(), stage = %stage, "Stage cancelled");
        } else {
            log_stage_error(run.subject(), stage, &err.to_string(), elapsed);
        }
        err
    }

    fn report(&self, stage: StageId, status: StageStatus, payload: Value) {
        self.sink
            .on_progress(&ProgressUpdate::new(stage, status, payload));
    }
}
