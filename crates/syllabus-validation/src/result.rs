use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Phrasing problems flagged by the remote reviewer.
///
/// Unknown categories are kept in `other` so newer reviewer output survives
/// a round trip through a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Violations {
    #[serde(default)]
    pub generic_phrases: Vec<String>,
    #[serde(default)]
    pub negative_framing: Vec<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Violations {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generic_phrases.is_empty() && self.negative_framing.is_empty() && self.other.is_empty()
    }
}

/// Structural metrics computed locally over the stage-3 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalMetrics {
    pub expected_concepts: usize,
    pub found_concepts: usize,
    /// `found / expected * 100`, capped at 100.
    pub completeness: f64,
    pub lifecycle_consistency: f64,
    pub format_consistency: f64,
    pub issues: Vec<String>,
}

/// Outcome of the validation stage.
///
/// Low scores are data, never errors. `fixes` maps section names to
/// replacement text; `fixes_applied` lists the keys that matched a section
/// when the fixes were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub expected_concepts: usize,
    pub found_concepts: usize,
    pub completeness: f64,
    pub lifecycle_consistency: f64,
    pub format_consistency: f64,
    pub framing_score: Option<f64>,
    pub terminology_score: Option<f64>,
    pub domain_specificity: Option<f64>,
    pub issues: Vec<String>,
    #[serde(default)]
    pub violations: Violations,
    #[serde(default)]
    pub fixes: BTreeMap<String, String>,
    #[serde(default)]
    pub fixes_applied: Vec<String>,
}

impl ValidationResult {
    /// Result carrying only local metrics.
    #[must_use]
    pub fn from_local(local: LocalMetrics) -> Self {
        Self {
            expected_concepts: local.expected_concepts,
            found_concepts: local.found_concepts,
            completeness: local.completeness,
            lifecycle_consistency: local.lifecycle_consistency,
            format_consistency: local.format_consistency,
            framing_score: None,
            terminology_score: None,
            domain_specificity: None,
            issues: local.issues,
            violations: Violations::default(),
            fixes: BTreeMap::new(),
            fixes_applied: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_fixes(&self) -> bool {
        !self.fixes.is_empty()
    }

    /// Whether every expected concept block was found.
    #[must_use]
    pub fn is_structurally_complete(&self) -> bool {
        self.found_concepts >= self.expected_concepts
    }
}
