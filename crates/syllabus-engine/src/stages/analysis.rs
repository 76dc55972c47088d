//! Stage 1: lifecycle inference and domain analysis.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::StageContext;
use crate::prompts;
use syllabus_llm::{LlmError, parse_json_object};
use syllabus_utils::error::PipelineError;
use syllabus_utils::types::{Lifecycle, Stage1Result, StageId};

#[derive(Debug, Deserialize)]
struct LifecycleResponse {
    lifecycle: Lifecycle,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    domain: String,
    role: String,
    #[serde(default)]
    lifecycle: Option<Lifecycle>,
    concepts: Vec<String>,
    #[serde(default)]
    excluded_actions: Vec<String>,
    #[serde(default)]
    source_verification: String,
}

pub(crate) async fn run(ctx: StageContext<'_>) -> Result<Stage1Result, PipelineError> {
    let lifecycle = infer_lifecycle(ctx)
        .await
        .map_err(|e| PipelineError::from_llm(StageId::Analysis, e))?;

    let inv = ctx
        .invocation(
            "analysis",
            prompts::ANALYST_SYSTEM,
            prompts::analysis(ctx.subject, &lifecycle),
            ctx.settings.tokens.analysis(),
        )
        .with_metadata("lifecycle", json!(lifecycle));

    let raw = ctx
        .client
        .invoke(inv, ctx.cancel)
        .await
        .map_err(|e| PipelineError::from_llm(StageId::Analysis, e))?;

    parse_analysis(&raw, lifecycle)
        .map_err(|reason| {
            PipelineError::from_llm(StageId::Analysis, LlmError::MalformedResponse(reason))
        })
}

/// Lifecycle seeding the analysis prompt.
///
/// Any failure other than cancellation falls back to [`Lifecycle::fallback`].
async fn infer_lifecycle(ctx: StageContext<'_>) -> Result<Lifecycle, LlmError> {
    let inv = ctx.invocation(
        "lifecycle",
        prompts::ANALYST_SYSTEM,
        prompts::lifecycle(ctx.subject),
        ctx.settings.tokens.lifecycle(),
    );

    let parsed = match ctx.client.invoke(inv, ctx.cancel).await {
        Ok(raw) => parse_json_object::<LifecycleResponse>(&raw)
            .and_then(|r| usable(r.lifecycle).ok_or_else(|| "blank lifecycle verb".to_string())),
        Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
        Err(e) => Err(e.to_string()),
    };

    match parsed {
        Ok(lifecycle) => {
            debug!(verbs = ?lifecycle.verbs(), "Inferred lifecycle");
            Ok(lifecycle)
        }
        Err(reason) => {
            warn!(reason = %reason, "Lifecycle inference failed; using default lifecycle");
            Ok(Lifecycle::fallback())
        }
    }
}

fn usable(lifecycle: Lifecycle) -> Option<Lifecycle> {
    let named = lifecycle.iter().all(|p| !p.verb.trim().is_empty());
    named.then_some(lifecycle)
}

fn parse_analysis(raw: &str, seeded: Lifecycle) -> Result<Stage1Result, String> {
    let response: AnalysisResponse = parse_json_object(raw)?;

    let concepts: Vec<String> = response
        .concepts
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if concepts.is_empty() {
        return Err("analysis listed no concepts".to_string());
    }

    Ok(Stage1Result {
        domain: response.domain,
        role: response.role,
        lifecycle: response.lifecycle.and_then(usable).unwrap_or(seeded),
        concepts,
        excluded_actions: response.excluded_actions,
        source_verification: response.source_verification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_trims_concepts_and_keeps_seed() {
        let raw = r#"Sure: {"domain": "d", "role": "r", "concepts": [" A ", "", "B"]}"#;
        let result = parse_analysis(raw, Lifecycle::fallback()).unwrap();
        assert_eq!(result.concepts, vec!["A", "B"]);
        assert_eq!(result.lifecycle, Lifecycle::fallback());
    }

    #[test]
    fn test_parse_analysis_rejects_empty_concepts() {
        let raw = r#"{"domain": "d", "role": "r", "concepts": []}"#;
        assert!(parse_analysis(raw, Lifecycle::fallback()).is_err());
    }

    #[test]
    fn test_parse_analysis_rejects_prose() {
        assert!(parse_analysis("no json here", Lifecycle::fallback()).is_err());
    }

    #[test]
    fn test_lifecycle_with_two_phases_does_not_parse() {
        let raw = concat!(
            r#"{"lifecycle": [{"verb": "A", "description": ""}, "#,
            r#"{"verb": "B", "description": ""}]}"#,
        );
        assert!(parse_json_object::<LifecycleResponse>(raw).is_err());
    }
}
