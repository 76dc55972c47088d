//! Stage 4: local metrics, remote review and section fixes.

use tracing::{debug, info};

use super::StageContext;
use syllabus_utils::error::PipelineError;
use syllabus_utils::types::{Stage1Result, StageId};
use syllabus_validation::{
    LocalValidator, RemoteValidator, SectionPatcher, ValidationResult, apply_fixes, merge,
};

/// Assess `content` locally and remotely; fixes are proposed, not applied.
pub(crate) async fn assess(
    ctx: StageContext<'_>,
    stage1: &Stage1Result,
    content: &str,
) -> Result<ValidationResult, PipelineError> {
    let expected = stage1.manifest().len();
    let local = LocalValidator::new(&stage1.lifecycle).validate(content, expected);
    debug!(
        found = local.found_concepts,
        expected,
        completeness = local.completeness,
        format = local.format_consistency,
        lifecycle = local.lifecycle_consistency,
        "Local validation"
    );

    let remote = RemoteValidator::new(ctx.client.clone(), ctx.settings.review())
        .assess(ctx.subject, content, &local, ctx.cancel)
        .await
        .map_err(|e| PipelineError::from_llm(StageId::Validation, e))?;

    Ok(merge(local, Some(remote)))
}

/// Apply the fixes in `result` to `content`, recording which ones matched.
pub(crate) fn apply(
    patcher: &dyn SectionPatcher,
    content: &str,
    result: &mut ValidationResult,
) -> String {
    let outcome = apply_fixes(patcher, content, &result.fixes);
    info!(
        applied = outcome.applied.len(),
        skipped = outcome.skipped.len(),
        "Applied section fixes"
    );
    result.fixes_applied = outcome.applied;
    outcome.text
}
