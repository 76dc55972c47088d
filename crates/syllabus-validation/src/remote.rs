//! Model-assisted review of soft quality dimensions.
//!
//! The reviewer sees a sampled view of the document (head, middle and tail
//! windows) plus the local metrics, and answers with a JSON object of scores,
//! issues, phrasing violations and optional section fixes. Its scores are
//! merged next to the structural metrics and never replace them.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::result::{LocalMetrics, ValidationResult, Violations};
use syllabus_llm::{LlmError, LlmInvocation, Message, ModelClient, parse_json_object};

/// Marker between sampled windows.
const ELISION: &str = "\n\n[... omitted ...]\n\n";

const REVIEW_SYSTEM_PROMPT: &str = "You are a strict curriculum quality reviewer. \
Respond with a single JSON object and nothing else.";

/// Call settings for the review request.
#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub sample_window_chars: usize,
}

/// Parsed reviewer answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteAssessment {
    #[serde(default)]
    pub framing_score: Option<f64>,
    #[serde(default)]
    pub terminology_score: Option<f64>,
    #[serde(default)]
    pub domain_specificity: Option<f64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub violations: Violations,
    #[serde(default, deserialize_with = "deserialize_fixes")]
    pub fixes: BTreeMap<String, String>,
}

/// Accept `null` and non-string values in `fixes`, keeping only string entries.
fn deserialize_fixes<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) if !s.trim().is_empty() => Some((k, s)),
            _ => None,
        })
        .collect())
}

/// Remote validator bound to a model client.
#[derive(Clone)]
pub struct RemoteValidator {
    client: ModelClient,
    settings: ReviewSettings,
}

impl RemoteValidator {
    #[must_use]
    pub fn new(client: ModelClient, settings: ReviewSettings) -> Self {
        Self { client, settings }
    }

    /// Ask the model to review `document`.
    ///
    /// An unparseable answer degrades to `None` scores plus an issue entry;
    /// only call failures are errors.
    ///
    /// # Errors
    ///
    /// Any `LlmError` from the model client, including `Cancelled`.
    pub async fn assess(
        &self,
        subject: &str,
        document: &str,
        local: &LocalMetrics,
        cancel: &CancellationToken,
    ) -> Result<RemoteAssessment, LlmError> {
        let sample = sample_document(document, self.settings.sample_window_chars);
        debug!(
            subject = %subject,
            document_chars = document.chars().count(),
            sample_chars = sample.chars().count(),
            "Requesting remote review"
        );

        let inv = LlmInvocation::new(
            subject,
            "review",
            self.settings.timeout,
            vec![Message::user(review_prompt(subject, &sample, local))],
        )
        .with_model(self.settings.model.clone())
        .with_system_prompt(REVIEW_SYSTEM_PROMPT)
        .with_max_tokens(self.settings.max_tokens);

        let raw = self.client.invoke(inv, cancel).await?;
        Ok(parse_review(&raw))
    }
}

/// Parse a reviewer answer, degrading gracefully on malformed output.
#[must_use]
pub fn parse_review(raw: &str) -> RemoteAssessment {
    match parse_json_object::<RemoteAssessment>(raw) {
        Ok(mut assessment) => {
            assessment.framing_score = assessment.framing_score.map(clamp_score);
            assessment.terminology_score = assessment.terminology_score.map(clamp_score);
            assessment.domain_specificity = assessment.domain_specificity.map(clamp_score);
            assessment
        }
        Err(reason) => {
            warn!(reason = %reason, "Remote review was not valid JSON; keeping local metrics only");
            RemoteAssessment {
                issues: vec![format!("Remote review unavailable: {reason}")],
                ..RemoteAssessment::default()
            }
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Merge local metrics with an optional remote assessment.
///
/// Structural counts always come from `local`.
#[must_use]
pub fn merge(local: LocalMetrics, remote: Option<RemoteAssessment>) -> ValidationResult {
    let mut result = ValidationResult::from_local(local);
    if let Some(remote) = remote {
        result.framing_score = remote.framing_score;
        result.terminology_score = remote.terminology_score;
        result.domain_specificity = remote.domain_specificity;
        result.issues.extend(remote.issues);
        result.violations = remote.violations;
        result.fixes = remote.fixes;
    }
    result
}

/// Head, middle and tail windows of `document`, each `window` chars long.
///
/// Documents no longer than three windows are returned whole.
#[must_use]
pub fn sample_document(document: &str, window: usize) -> String {
    let total = document.chars().count();
    if window == 0 || total <= window.saturating_mul(3) {
        return document.to_string();
    }

    let middle_start = total / 2 - window / 2;
    let windows = [
        (0, window),
        (middle_start, middle_start + window),
        (total - window, total),
    ];

    windows
        .iter()
        .map(|&(from, to)| char_slice(document, from, to))
        .collect::<Vec<_>>()
        .join(ELISION)
}

fn char_slice(text: &str, from: usize, to: usize) -> &str {
    let byte_at = |n: usize| text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
    &text[byte_at(from)..byte_at(to)]
}

fn review_prompt(subject: &str, sample: &str, local: &LocalMetrics) -> String {
    format!(
        "Review this curriculum for \"{subject}\".\n\n\
         Structural metrics already computed (do not recompute):\n\
         - concepts found: {found} of {expected}\n\
         - lifecycle consistency: {lifecycle}%\n\
         - format consistency: {format}%\n\n\
         Score 0-100:\n\
         - framing_score: positive, capability-oriented framing. Subtract 10 per \
           negative or fear-based framing.\n\
         - terminology_score: density of precise domain terminology. Subtract 5 per \
           generic filler phrase (\"in today's world\", \"it is important to note\").\n\
         - domain_specificity: how specific the material is to {subject} rather than \
           any profession.\n\n\
         List offending phrases under violations.generic_phrases and \
         violations.negative_framing. If a section needs rewriting, put the full \
         replacement text under fixes keyed by its exact section heading without \
         the leading ##.\n\n\
         Answer with JSON of the form:\n\
         {{\"framing_score\": 0, \"terminology_score\": 0, \"domain_specificity\": 0, \
         \"issues\": [], \"violations\": {{\"generic_phrases\": [], \"negative_framing\": []}}, \
         \"fixes\": {{}}}}\n\n\
         Document sample:\n\n{sample}",
        found = local.found_concepts,
        expected = local.expected_concepts,
        lifecycle = local.lifecycle_consistency,
        format = local.format_consistency,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use syllabus_llm::{RecordingBackend, SimulatedBackend};

    fn local() -> LocalMetrics {
        LocalMetrics {
            expected_concepts: 10,
            found_concepts: 10,
            completeness: 100.0,
            lifecycle_consistency: 90.0,
            format_consistency: 95.0,
            issues: vec!["local issue".to_string()],
        }
    }

    fn settings() -> ReviewSettings {
        ReviewSettings {
            model: String::new(),
            timeout: Duration::from_secs(5),
            max_tokens: 1000,
            sample_window_chars: 10,
        }
    }

    #[test]
    fn test_sample_keeps_short_documents_whole() {
        assert_eq!(sample_document("short", 10), "short");
    }

    #[test]
    fn test_sample_takes_head_middle_tail() {
        let doc: String = ('a'..='z').cycle().take(100).collect();
        let sample = sample_document(&doc, 5);
        let parts: Vec<&str> = sample.split(ELISION).collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], &doc[..5]);
        assert_eq!(parts[1], &doc[48..53]);
        assert_eq!(parts[2], &doc[95..]);
    }

    #[test]
    fn test_sample_respects_char_boundaries() {
        let doc = "é".repeat(40);
        let sample = sample_document(&doc, 4);
        assert!(sample.starts_with("éééé"));
    }

    #[test]
    fn test_parse_review_clamps_and_keeps_unknown_violations() {
        let raw = r#"Result: {"framing_score": 140, "terminology_score": -3,
            "domain_specificity": 70, "issues": ["thin examples"],
            "violations": {"generic_phrases": ["in today's world"], "hedging": ["maybe"]},
            "fixes": {"COMMON MISTAKES": "rewrite", "EMPTY": "", "BAD": 3}}"#;
        let review = parse_review(raw);
        assert_eq!(review.framing_score, Some(100.0));
        assert_eq!(review.terminology_score, Some(0.0));
        assert_eq!(review.violations.generic_phrases.len(), 1);
        assert!(review.violations.other.contains_key("hedging"));
        assert_eq!(review.fixes.len(), 1);
    }

    #[test]
    fn test_parse_review_degrades_on_garbage() {
        let review = parse_review("I cannot review this.");
        assert_eq!(review.framing_score, None);
        assert!(review.fixes.is_empty());
        assert!(review.issues[0].starts_with("Remote review unavailable"));
    }

    #[test]
    fn test_merge_never_overrides_structural_counts() {
        let remote = RemoteAssessment {
            framing_score: Some(80.0),
            issues: vec!["remote issue".to_string()],
            ..RemoteAssessment::default()
        };
        let merged = merge(local(), Some(remote));
        assert_eq!(merged.found_concepts, 10);
        assert!((merged.format_consistency - 95.0).abs() < f64::EPSILON);
        assert_eq!(merged.framing_score, Some(80.0));
        assert_eq!(merged.issues, vec!["local issue", "remote issue"]);
    }

    #[tokio::test]
    async fn test_assess_uses_review_call() {
        let backend = Arc::new(RecordingBackend::new(SimulatedBackend::default()));
        let validator = RemoteValidator::new(ModelClient::new(backend.clone()), settings());
        let cancel = CancellationToken::new();

        let review = validator
            .assess("Test Subject", &"x".repeat(200), &local(), &cancel)
            .await
            .unwrap();

        assert_eq!(review.framing_score, Some(90.0));
        assert_eq!(backend.labels(), vec!["review"]);
    }

    #[tokio::test]
    async fn test_assess_propagates_call_failures() {
        let backend = Arc::new(
            RecordingBackend::new(SimulatedBackend::default())
                .fail_on("review", LlmError::ProviderOutage("down".into())),
        );
        let validator = RemoteValidator::new(ModelClient::new(backend), settings());
        let err = validator
            .assess("s", "doc", &local(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ProviderOutage(_)));
    }
}
