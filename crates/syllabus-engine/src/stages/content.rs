//! Stage 3: batched concept content plus the narrative sections.

use serde_json::json;
use tracing::debug;

use super::StageContext;
use crate::cleanup::strip_boilerplate;
use crate::progress::{MonotonicProgress, ProgressUpdate, payload};
use crate::prompts;
use crate::scheduler::{Batch, ScheduleReport};
use syllabus_llm::{LlmError, StreamAggregator};
use syllabus_utils::document::{CORE_CONCEPTS, section_heading};
use syllabus_utils::error::PipelineError;
use syllabus_utils::types::{ConceptManifest, Stage1Result, StageId, StageStatus};

#[derive(Debug, Clone)]
pub(crate) struct ContentOutput {
    pub text: String,
    pub report: ScheduleReport,
}

pub(crate) async fn run(
    ctx: StageContext<'_>,
    stage1: &Stage1Result,
    framework: &str,
) -> Result<ContentOutput, PipelineError> {
    let fail = |e: LlmError| PipelineError::from_llm(StageId::Content, e);

    let manifest = stage1.manifest();
    let progress = MonotonicProgress::new();
    let scheduler = ctx.settings.scheduler();

    let manifest_ref = &manifest;
    let progress_ref = &progress;
    let scheduled = scheduler
        .run(manifest.len(), ctx.cancel, move |batch| {
            run_batch(ctx, stage1, framework, manifest_ref, progress_ref, batch)
        })
        .await
        .map_err(fail)?;

    if ctx.cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    let narrative = run_narrative(ctx, stage1).await.map_err(fail)?;

    progress.offer(100.0, |value| {
        emit(ctx, "Concept content complete", &[("progress", json!(value))]);
    });

    let mut text = section_heading(CORE_CONCEPTS);
    text.push_str("\n\n");
    for output in &scheduled.outputs {
        text.push_str(output.trim_end());
        text.push_str("\n\n");
    }
    text.push_str(narrative.trim());

    Ok(ContentOutput {
        text: strip_boilerplate(&text),
        report: scheduled.report,
    })
}

async fn run_batch(
    ctx: StageContext<'_>,
    stage1: &Stage1Result,
    framework: &str,
    manifest: &ConceptManifest,
    progress: &MonotonicProgress,
    batch: Batch,
) -> Result<String, LlmError> {
    let concepts = manifest.slice(batch.range.clone());
    let first_number = batch.range.start + 1;
    let last_number = batch.range.end;

    let inv = ctx
        .invocation(
            "content",
            prompts::AUTHOR_SYSTEM,
            prompts::content_batch(ctx.subject, stage1, framework, concepts, first_number),
            ctx.settings.tokens.batch(),
        )
        .with_metadata("concepts", json!(concepts))
        .with_metadata("first_number", json!(first_number))
        .with_metadata("lifecycle_verbs", json!(stage1.lifecycle.verbs()))
        .with_metadata("batch_index", json!(batch.index));

    debug!(
        batch = batch.index,
        first = first_number,
        last = last_number,
        "Dispatching content batch"
    );
    let stream = ctx.client.invoke_streaming(inv, ctx.cancel).await?;

    let candidate = batch.streaming_progress();
    let message = format!(
        "Writing concepts {first_number}-{last_number} of {} (batch {} of {})",
        manifest.len(),
        batch.index + 1,
        batch.total_batches
    );
    let text = StreamAggregator::new()
        .collect(stream, |chars| {
            progress.offer(candidate, |value| {
                emit(
                    ctx,
                    &message,
                    &[
                        ("progress", json!(value)),
                        ("batch", json!(batch.index + 1)),
                        ("total_batches", json!(batch.total_batches)),
                        ("chars", json!(chars)),
                    ],
                );
            });
        })
        .await?;

    debug!(batch = batch.index, chars = text.len(), "Content batch complete");
    Ok(text)
}

async fn run_narrative(ctx: StageContext<'_>, stage1: &Stage1Result) -> Result<String, LlmError> {
    let inv = ctx.invocation(
        "narrative",
        prompts::AUTHOR_SYSTEM,
        prompts::narrative(ctx.subject, stage1),
        ctx.settings.tokens.narrative(),
    );
    let stream = ctx.client.invoke_streaming(inv, ctx.cancel).await?;
    StreamAggregator::new().collect(stream, |_| {}).await
}

fn emit(ctx: StageContext<'_>, message: &str, extra: &[(&str, serde_json::Value)]) {
    ctx.sink.on_progress(&ProgressUpdate::new(
        StageId::Content,
        StageStatus::InProgress,
        payload(message, extra),
    ));
}
