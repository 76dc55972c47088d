//! Stage 2: decision framework, one non-batched call.

use super::StageContext;
use crate::prompts;
use syllabus_utils::document::{DECISION_FRAMEWORK, section_heading};
use syllabus_utils::error::PipelineError;
use syllabus_utils::types::{Stage1Result, StageId};

pub(crate) async fn run(
    ctx: StageContext<'_>,
    stage1: &Stage1Result,
) -> Result<String, PipelineError> {
    let inv = ctx.invocation(
        "framework",
        prompts::AUTHOR_SYSTEM,
        prompts::framework(ctx.subject, stage1),
        ctx.settings.tokens.framework(),
    );

    let raw = ctx
        .client
        .invoke(inv, ctx.cancel)
        .await
        .map_err(|e| PipelineError::from_llm(StageId::Framework, e))?;

    Ok(with_heading(&raw))
}

/// Trimmed framework text that opens with its section heading.
fn with_heading(raw: &str) -> String {
    let heading = section_heading(DECISION_FRAMEWORK);
    let body = raw.trim();
    if body
        .lines()
        .next()
        .is_some_and(|line| line.trim().eq_ignore_ascii_case(&heading))
    {
        format!("{body}\n")
    } else {
        format!("{heading}\n\n{body}\n")
    }
}
