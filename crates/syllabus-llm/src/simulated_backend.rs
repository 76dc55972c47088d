//! Deterministic offline backend.
//!
//! Fabricates well-formed output for every call label the pipeline issues so
//! a run can be exercised end to end without network access (`--dry-run`).
//! Output depends only on the invocation, never on timing.

use async_trait::async_trait;
use futures_util::stream;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

use crate::LlmError;
use crate::types::{FragmentStream, LlmBackend, LlmInvocation, LlmResult};
use syllabus_config::Config;
use syllabus_utils::document::{
    CONCEPT_DELIMITER, DECISION_FRAMEWORK, DEFINITION_MARKER, LIFECYCLE_HEADER,
    NARRATIVE_SECTIONS, concept_heading, lifecycle_label, section_heading,
};

/// Concepts reported by the fake analysis stage unless configured.
pub const DEFAULT_SIMULATED_CONCEPTS: usize = 12;

const DEFAULT_FRAGMENT_CHARS: usize = 64;

const SIMULATED_VERBS: [(&str, &str); 3] = [
    ("Assess", "Establish the situation, constraints and goals"),
    ("Apply", "Carry out the core technique under real conditions"),
    ("Verify", "Check results against professional standards"),
];

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    concepts: usize,
    fragment_chars: usize,
    overrides: HashMap<String, String>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_CONCEPTS)
    }
}

impl SimulatedBackend {
    #[must_use]
    pub fn new(concepts: usize) -> Self {
        Self {
            concepts,
            fragment_chars: DEFAULT_FRAGMENT_CHARS,
            overrides: HashMap::new(),
        }
    }

    #[must_use]
    pub fn new_from_config(config: &Config) -> Self {
        let section = config.llm.simulated.clone().unwrap_or_default();
        let mut backend = Self::new(section.concepts.unwrap_or(DEFAULT_SIMULATED_CONCEPTS));
        if let Some(chars) = section.fragment_chars {
            backend = backend.with_fragment_chars(chars);
        }
        backend
    }

    /// Characters per streamed fragment; clamped to at least one.
    #[must_use]
    pub fn with_fragment_chars(mut self, chars: usize) -> Self {
        self.fragment_chars = chars.max(1);
        self
    }

    /// Replace the fabricated output for one call label.
    #[must_use]
    pub fn with_response(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.overrides.insert(label.into(), text.into());
        self
    }

    /// The full text this backend answers `inv` with.
    ///
    /// # Errors
    ///
    /// `LlmError::Unsupported` for an unknown call label.
    pub fn respond(&self, inv: &LlmInvocation) -> Result<String, LlmError> {
        if let Some(text) = self.overrides.get(&inv.label) {
            return Ok(text.clone());
        }
        match inv.label.as_str() {
            "lifecycle" => Ok(lifecycle_json().to_string()),
            "analysis" => Ok(self.analysis(inv)),
            "framework" => Ok(framework(&inv.subject)),
            "content" => Ok(concept_blocks(inv)),
            "narrative" => Ok(narrative(&inv.subject)),
            "review" => Ok(review_json().to_string()),
            other => Err(LlmError::Unsupported(format!(
                "simulated backend has no response for call '{other}'"
            ))),
        }
    }

    fn analysis(&self, inv: &LlmInvocation) -> String {
        let lifecycle = inv
            .metadata
            .get("lifecycle")
            .cloned()
            .unwrap_or_else(|| lifecycle_json()["lifecycle"].clone());
        let concepts: Vec<String> = (1..=self.concepts)
            .map(|i| format!("{} Principle {i}", inv.subject))
            .collect();
        let body = json!({
            "domain": format!("{} practice", inv.subject),
            "role": format!("{} practitioner", inv.subject),
            "lifecycle": lifecycle,
            "concepts": concepts,
            "excluded_actions": ["Giving legal advice", "Guaranteeing outcomes"],
            "source_verification": "Simulated analysis; no external sources consulted",
        });
        format!("Here is the domain analysis:\n```json\n{body:#}\n```\n")
    }

    fn fragments(&self, text: &str) -> Vec<Result<String, LlmError>> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.fragment_chars)
            .map(|chunk| Ok(chunk.iter().collect::<String>()))
            .collect()
    }
}

fn lifecycle_json() -> Value {
    let phases: Vec<Value> = SIMULATED_VERBS
        .iter()
        .map(|(verb, description)| json!({ "verb": verb, "description": description }))
        .collect();
    json!({ "lifecycle": phases })
}

fn framework(subject: &str) -> String {
    format!(
        "{heading}\n\n\
         Work in {subject} moves from assessment to application to verification.\n\n\
         - Foundational principles precede applied techniques.\n\
         - Verification depends on a completed application step.\n\
         - Escalate when constraints conflict with standards.\n\n",
        heading = section_heading(DECISION_FRAMEWORK),
    )
}

/// Concept blocks for the names in `metadata.concepts`, numbered from
/// `metadata.first_number`.
fn concept_blocks(inv: &LlmInvocation) -> String {
    let first = inv.metadata_usize("first_number").unwrap_or(1);
    let mut verbs = inv.metadata_strings("lifecycle_verbs");
    if verbs.len() != 3 {
        verbs = SIMULATED_VERBS.iter().map(|(v, _)| (*v).to_string()).collect();
    }

    let mut out = String::new();
    for (offset, name) in inv.metadata_strings("concepts").iter().enumerate() {
        out.push_str(&concept_heading(first + offset, name));
        out.push_str("\n\n");
        out.push_str(&format!(
            "{DEFINITION_MARKER} {name} is a working principle of {}.\n\n",
            inv.subject
        ));
        out.push_str(LIFECYCLE_HEADER);
        out.push('\n');
        for verb in &verbs {
            out.push_str(&format!(
                "{} Practitioners {} {name} deliberately.\n",
                lifecycle_label(verb),
                verb.to_lowercase()
            ));
        }
        out.push('\n');
        out.push_str(CONCEPT_DELIMITER);
        out.push_str("\n\n");
    }
    out
}

fn narrative(subject: &str) -> String {
    NARRATIVE_SECTIONS
        .iter()
        .map(|name| {
            format!(
                "{}\n\nGuidance on {} for {subject} practitioners.\n\n",
                section_heading(name),
                name.to_lowercase()
            )
        })
        .collect()
}

fn review_json() -> Value {
    json!({
        "framing_score": 90,
        "terminology_score": 85,
        "domain_specificity": 88,
        "issues": [],
        "violations": { "generic_phrases": [], "negative_framing": [] },
        "fixes": {}
    })
}

#[async_trait]
impl LlmBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        debug!(provider = "simulated", label = %inv.label, "Simulated invocation");
        let text = self.respond(&inv)?;
        Ok(LlmResult::new(text, "simulated", "simulated"))
    }

    async fn invoke_streaming(&self, inv: LlmInvocation) -> Result<FragmentStream, LlmError> {
        debug!(provider = "simulated", label = %inv.label, "Simulated stream");
        let text = self.respond(&inv)?;
        Ok(Box::pin(stream::iter(self.fragments(&text))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;

    fn inv(label: &str) -> LlmInvocation {
        LlmInvocation::new("Test Subject", label, Duration::from_secs(1), vec![])
    }

    #[test]
    fn test_analysis_reports_configured_concept_count() {
        let backend = SimulatedBackend::new(5);
        let text = backend.respond(&inv("analysis")).unwrap();
        let start = text.find('{').unwrap();
        let end = text.rfind('}').unwrap();
        let value: Value = serde_json::from_str(&text[start..=end]).unwrap();
        assert_eq!(value["concepts"].as_array().unwrap().len(), 5);
        assert_eq!(value["lifecycle"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_content_blocks_follow_metadata() {
        let backend = SimulatedBackend::default();
        let request = inv("content")
            .with_metadata("concepts", json!(["Alpha", "Beta"]))
            .with_metadata("first_number", json!(11));
        let text = backend.respond(&request).unwrap();
        assert!(text.contains("### CONCEPT 11: Alpha"));
        assert!(text.contains("### CONCEPT 12: Beta"));
        assert_eq!(text.matches("**ASSESS:**").count(), 2);
    }

    #[tokio::test]
    async fn test_stream_reassembles_to_full_response() {
        let backend = SimulatedBackend::default().with_fragment_chars(7);
        let expected = backend.respond(&inv("narrative")).unwrap();
        let fragments: Vec<String> = backend
            .invoke_streaming(inv("narrative"))
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert!(fragments.len() > 1);
        assert!(fragments.iter().all(|f| f.chars().count() <= 7));
        assert_eq!(fragments.concat(), expected);
    }

    #[test]
    fn test_overrides_and_unknown_labels() {
        let backend = SimulatedBackend::default().with_response("review", "not json");
        assert_eq!(backend.respond(&inv("review")).unwrap(), "not json");
        assert!(matches!(
            backend.respond(&inv("poetry")),
            Err(LlmError::Unsupported(_))
        ));
    }
}
