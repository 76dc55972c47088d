//! Shared domain types for the generation pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Stage identifiers for the four-stage generation pipeline.
///
/// Stages execute strictly in order:
///
/// ```text
/// Analysis → Framework → Content → Validation
/// ```
///
/// # Dependencies
///
/// - `Analysis`: No dependencies (starting stage)
/// - `Framework`: Requires `Analysis`
/// - `Content`: Requires `Analysis` and `Framework`
/// - `Validation`: Requires `Content`
///
/// # Example
///
/// ```rust
/// use syllabus_utils::types::StageId;
///
/// let stage = StageId::Content;
/// assert_eq!(stage.index(), 3);
/// assert_eq!(stage.as_str(), "content");
/// assert_eq!(stage.next(), Some(StageId::Validation));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    /// Stage 1: domain and lifecycle analysis, produces the concept list.
    Analysis,
    /// Stage 2: dependency and decision framework.
    Framework,
    /// Stage 3: bulk concept content, batched.
    Content,
    /// Stage 4: local + remote validation and section fixes.
    Validation,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [StageId; 4] = [
        StageId::Analysis,
        StageId::Framework,
        StageId::Content,
        StageId::Validation,
    ];

    /// Returns the canonical lowercase name used in logs, checkpoints and progress payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Framework => "framework",
            Self::Content => "content",
            Self::Validation => "validation",
        }
    }

    /// 1-based stage index.
    #[must_use]
    pub const fn index(&self) -> u8 {
        match self {
            Self::Analysis => 1,
            Self::Framework => 2,
            Self::Content => 3,
            Self::Validation => 4,
        }
    }

    /// Look up a stage by its 1-based index.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Analysis),
            2 => Some(Self::Framework),
            3 => Some(Self::Content),
            4 => Some(Self::Validation),
            _ => None,
        }
    }

    /// The stage that follows this one, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Analysis => Some(Self::Framework),
            Self::Framework => Some(Self::Content),
            Self::Content => Some(Self::Validation),
            Self::Validation => None,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single stage.
///
/// Statuses are ordered; a stage's status never moves backwards.
/// `Fixing` is only reachable by the validation stage, between its
/// quality assessment and delivery of corrected content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Queued,
    InProgress,
    Fixing,
    Complete,
}

impl StageStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Fixing => "fixing",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One phase of the three-phase professional lifecycle (e.g. "Assess").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePhase {
    pub verb: String,
    pub description: String,
}

impl LifecyclePhase {
    #[must_use]
    pub fn new(verb: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            description: description.into(),
        }
    }
}

/// Ordered triple of lifecycle phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lifecycle(pub [LifecyclePhase; 3]);

impl Lifecycle {
    /// Lifecycle used when shape inference fails.
    #[must_use]
    pub fn fallback() -> Self {
        Self([
            LifecyclePhase::new("Prepare", "Gather context, constraints and resources"),
            LifecyclePhase::new("Execute", "Carry out the core professional work"),
            LifecyclePhase::new("Review", "Evaluate outcomes and refine practice"),
        ])
    }

    #[must_use]
    pub fn verbs(&self) -> [&str; 3] {
        [
            self.0[0].verb.as_str(),
            self.0[1].verb.as_str(),
            self.0[2].verb.as_str(),
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LifecyclePhase> {
        self.0.iter()
    }
}

/// Output of the analysis stage. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage1Result {
    pub domain: String,
    pub role: String,
    pub lifecycle: Lifecycle,
    pub concepts: Vec<String>,
    #[serde(default)]
    pub excluded_actions: Vec<String>,
    #[serde(default)]
    pub source_verification: String,
}

impl Stage1Result {
    /// Typed view of the concept list used for all content batching math.
    #[must_use]
    pub fn manifest(&self) -> ConceptManifest {
        ConceptManifest::new(self.concepts.clone())
    }
}

/// Ordered list of concepts handed from the analysis stage to the batch scheduler.
///
/// This is the single source of truth for how many concepts the content stage
/// must cover and in which order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptManifest {
    concepts: Vec<String>,
}

impl ConceptManifest {
    #[must_use]
    pub fn new(concepts: Vec<String>) -> Self {
        Self { concepts }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Concepts in the half-open range, clamped to the manifest.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> &[String] {
        let end = range.end.min(self.concepts.len());
        let start = range.start.min(end);
        &self.concepts[start..end]
    }

    #[must_use]
    pub fn concepts(&self) -> &[String] {
        &self.concepts
    }
}
