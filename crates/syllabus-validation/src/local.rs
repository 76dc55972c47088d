//! Deterministic structural metrics over generated concept content.
//!
//! Counts concept blocks and the markers expected inside each one. Pure: the
//! same text and expected count always produce the same metrics.

use regex::Regex;
use std::sync::LazyLock;

use crate::result::LocalMetrics;
use syllabus_utils::document::{
    CONCEPT_DELIMITER, CONCEPT_HEADING_PREFIX, DEFINITION_MARKER, LIFECYCLE_HEADER,
};
use syllabus_utils::types::Lifecycle;

/// Start of every `### CONCEPT n: Name` heading.
static CONCEPT_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^[ \t]*{}\d+\s*:",
        regex::escape(CONCEPT_HEADING_PREFIX)
    ))
    .expect("concept heading pattern is valid")
});

/// Start of a top-level `## SECTION` heading, which closes any open concept block.
static SECTION_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*## ").expect("section heading pattern is valid"));

/// Structural markers expected per concept block.
const MARKERS_PER_BLOCK: usize = 3;

/// Validator for the structure of stage-3 content.
#[derive(Debug, Clone)]
pub struct LocalValidator {
    labels: Vec<Regex>,
}

impl LocalValidator {
    /// Validator expecting the three phase labels of `lifecycle` inside each block.
    #[must_use]
    pub fn new(lifecycle: &Lifecycle) -> Self {
        let labels = lifecycle
            .verbs()
            .iter()
            .filter_map(|verb| {
                Regex::new(&format!(r"(?i)\*\*{}:?\*\*:?", regex::escape(verb.trim()))).ok()
            })
            .collect();
        Self { labels }
    }

    /// Compute metrics for `text` against `expected` concepts.
    #[must_use]
    pub fn validate(&self, text: &str, expected: usize) -> LocalMetrics {
        let blocks = concept_blocks(text);
        let found = blocks.len();

        let mut marker_hits = 0usize;
        let mut label_hits = 0usize;
        let mut missing_lifecycle = 0usize;
        let mut missing_delimiter = 0usize;

        for block in &blocks {
            let has_definition = block.contains(DEFINITION_MARKER);
            let has_lifecycle = block.contains(LIFECYCLE_HEADER);
            let has_delimiter = block.lines().any(|l| l.trim() == CONCEPT_DELIMITER);
            marker_hits += usize::from(has_definition)
                + usize::from(has_lifecycle)
                + usize::from(has_delimiter);

            if !has_lifecycle {
                missing_lifecycle += 1;
            }
            if !has_delimiter {
                missing_delimiter += 1;
            }

            label_hits += self.labels.iter().filter(|re| re.is_match(block)).count();
        }

        let completeness = if expected == 0 {
            100.0
        } else {
            percentage(found, expected).min(100.0)
        };
        let format_consistency = percentage(marker_hits, MARKERS_PER_BLOCK * found);
        let lifecycle_consistency = percentage(label_hits, MARKERS_PER_BLOCK * found);

        let mut issues = Vec::new();
        if found < expected {
            issues.push(format!(
                "Found {found} of {expected} expected concept sections"
            ));
        }
        if found > expected {
            issues.push(format!(
                "Found {found} concept sections but only {expected} were planned"
            ));
        }
        if missing_lifecycle > 0 {
            issues.push(format!(
                "{missing_lifecycle} concept section(s) lack a lifecycle breakdown"
            ));
        }
        if missing_delimiter > 0 {
            issues.push(format!(
                "{missing_delimiter} concept section(s) are not closed with '{CONCEPT_DELIMITER}'"
            ));
        }

        LocalMetrics {
            expected_concepts: expected,
            found_concepts: found,
            completeness,
            lifecycle_consistency,
            format_consistency,
            issues,
        }
    }
}

/// Text of each concept block: its heading up to the next concept heading
/// or `## ` section heading, whichever comes first.
fn concept_blocks(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = CONCEPT_HEADING.find_iter(text).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let next_concept = starts.get(i + 1).copied().unwrap_or(text.len());
            let next_section = SECTION_HEADING
                .find_at(text, start)
                .map_or(text.len(), |m| m.start());
            &text[start..next_concept.min(next_section)]
        })
        .collect()
}

/// `part / whole * 100` rounded to one decimal; zero when `whole` is zero.
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use syllabus_utils::document::{concept_heading, lifecycle_label};

    fn block(n: usize, verbs: &[&str], delimiter: bool) -> String {
        let mut out = format!(
            "{}\n\n{DEFINITION_MARKER} text.\n\n{LIFECYCLE_HEADER}\n",
            concept_heading(n, "Name")
        );
        for verb in verbs {
            out.push_str(&format!("{} detail\n", lifecycle_label(verb)));
        }
        if delimiter {
            out.push_str("\n---\n\n");
        }
        out
    }

    fn validator() -> LocalValidator {
        LocalValidator::new(&Lifecycle::fallback())
    }

    #[test]
    fn test_eight_of_ten_concepts_is_eighty_percent_complete() {
        let text: String = (1..=8)
            .map(|n| block(n, &["Prepare", "Execute", "Review"], true))
            .collect();
        let metrics = validator().validate(&text, 10);
        assert_eq!(metrics.found_concepts, 8);
        assert!((metrics.completeness - 80.0).abs() < f64::EPSILON);
        assert!((metrics.format_consistency - 100.0).abs() < f64::EPSILON);
        assert!((metrics.lifecycle_consistency - 100.0).abs() < f64::EPSILON);
        assert!(metrics.issues[0].contains("8 of 10"));
    }

    #[test]
    fn test_completeness_is_capped() {
        let text: String = (1..=3).map(|n| block(n, &["Prepare"], true)).collect();
        let metrics = validator().validate(&text, 2);
        assert!((metrics.completeness - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_expected_is_complete() {
        let metrics = validator().validate("", 0);
        assert!((metrics.completeness - 100.0).abs() < f64::EPSILON);
        assert!((metrics.format_consistency).abs() < f64::EPSILON);
        assert!(metrics.issues.is_empty());
    }

    #[test]
    fn test_partial_markers_lower_scores() {
        let text = format!(
            "{}{}",
            block(1, &["Prepare", "Execute", "Review"], true),
            block(2, &["Prepare"], false)
        );
        let metrics = validator().validate(&text, 2);
        // 5 of 6 markers, block 2 has no delimiter
        assert!((metrics.format_consistency - 83.3).abs() < 1e-9);
        // 4 of 6 labels
        assert!((metrics.lifecycle_consistency - 66.7).abs() < 1e-9);
        assert!(metrics.issues.iter().any(|i| i.contains("not closed")));
    }

    #[test]
    fn test_narrative_markers_do_not_count_for_last_concept() {
        let narrative = format!(
            "## PRACTICAL APPLICATIONS\n\n{LIFECYCLE_HEADER}\n{}\n{}\n{}\n\n---\n",
            lifecycle_label("Prepare"),
            lifecycle_label("Execute"),
            lifecycle_label("Review"),
        );
        let text = format!(
            "{}{}\n\n{DEFINITION_MARKER} bare.\n\n{narrative}",
            block(1, &["Prepare", "Execute", "Review"], true),
            concept_heading(2, "Bare")
        );
        let metrics = validator().validate(&text, 2);

        assert_eq!(metrics.found_concepts, 2);
        // 4 of 6 markers, 3 of 6 labels
        assert!((metrics.format_consistency - 66.7).abs() < 1e-9);
        assert!((metrics.lifecycle_consistency - 50.0).abs() < 1e-9);
        assert!(metrics.issues.iter().any(|i| i.contains("lack a lifecycle breakdown")));
        assert!(metrics.issues.iter().any(|i| i.contains("not closed")));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let text: String = (1..=5)
            .map(|n| block(n, &["Prepare", "Review"], n % 2 == 0))
            .collect();
        let v = validator();
        assert_eq!(v.validate(&text, 7), v.validate(&text, 7));
    }

    #[test]
    fn test_label_match_is_case_insensitive() {
        let lifecycle = Lifecycle::fallback();
        let text = format!(
            "{}\n{DEFINITION_MARKER} x\n{LIFECYCLE_HEADER}\n\
             **prepare:** a\n**Execute**: b\n**REVIEW:** c\n---\n",
            concept_heading(1, "A")
        );
        let metrics = LocalValidator::new(&lifecycle).validate(&text, 1);
        assert!((metrics.lifecycle_consistency - 100.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_scores_stay_in_range(
            found in 0usize..40,
            expected in 0usize..40,
            labelled in 0usize..4,
        ) {
            let verbs = &["Prepare", "Execute", "Review"][..labelled.min(3)];
            let text: String = (1..=found).map(|n| block(n, verbs, n % 3 != 0)).collect();
            let metrics = validator().validate(&text, expected);

            prop_assert_eq!(metrics.found_concepts, found);
            for score in [
                metrics.completeness,
                metrics.format_consistency,
                metrics.lifecycle_consistency,
            ] {
                prop_assert!((0.0..=100.0).contains(&score));
            }
            if found >= expected {
                prop_assert!((metrics.completeness - 100.0).abs() < f64::EPSILON);
            }
        }
    }
}
