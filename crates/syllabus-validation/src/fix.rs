//! Section-granularity corrections.
//!
//! A fix replaces everything from a `## NAME` heading up to the next `## `
//! heading (or the end of the document). Unknown sections are skipped without
//! error. [`SectionPatcher`] isolates the strategy so a structured section
//! tree can replace the regex implementation later.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, info};

use syllabus_utils::document::section_heading;

/// Start of any top-level section heading.
static NEXT_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## ").expect("section pattern is valid"));

/// Replaces one named section of a document.
pub trait SectionPatcher: Send + Sync {
    /// The patched document, or `None` when `section` does not occur.
    fn patch(&self, document: &str, section: &str, replacement: &str) -> Option<String>;
}

/// Heading-regex implementation of [`SectionPatcher`].
///
/// Section names match case-insensitively; leading `#` characters in the key
/// are ignored. A replacement that does not start with the section heading
/// gets the heading prepended, so the section stays addressable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingRegexPatcher;

impl SectionPatcher for HeadingRegexPatcher {
    fn patch(&self, document: &str, section: &str, replacement: &str) -> Option<String> {
        let name = normalize_key(section);
        if name.is_empty() {
            return None;
        }

        let heading = Regex::new(&format!(r"(?mi)^##[ \t]+{}[ \t]*$", regex::escape(&name))).ok()?;
        let found = heading.find(document)?;
        let start = found.start();
        let end = NEXT_SECTION
            .find_at(document, found.end())
            .map_or(document.len(), |m| m.start());

        let mut body = replacement.trim().to_string();
        if !heading.is_match(body.lines().next().unwrap_or_default()) {
            body = format!("{}\n\n{body}", section_heading(&name));
        }
        body.push_str(if end < document.len() { "\n\n" } else { "\n" });

        let mut patched = String::with_capacity(document.len() + body.len());
        patched.push_str(&document[..start]);
        patched.push_str(&body);
        patched.push_str(&document[end..]);
        Some(patched)
    }
}

fn normalize_key(section: &str) -> String {
    section.trim().trim_start_matches('#').trim().to_string()
}

/// Result of applying a fixes map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub text: String,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Apply every fix in key order. Unmatched keys are recorded as skipped.
#[must_use]
pub fn apply_fixes(
    patcher: &dyn SectionPatcher,
    document: &str,
    fixes: &BTreeMap<String, String>,
) -> FixOutcome {
    let mut text = document.to_string();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for (section, replacement) in fixes {
        match patcher.patch(&text, section, replacement) {
            Some(patched) => {
                debug!(section = %section, "Applied section fix");
                text = patched;
                applied.push(section.clone());
            }
            None => {
                debug!(section = %section, "Section not found; fix skipped");
                skipped.push(section.clone());
            }
        }
    }

    if !skipped.is_empty() {
        info!(skipped = skipped.len(), applied = applied.len(), "Some fixes matched no section");
    }

    FixOutcome {
        text,
        applied,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "## CORE CONCEPTS\n\n### CONCEPT 1: A\nbody\n\n\
                       ## COMMON MISTAKES\n\nold text\n\n\
                       ## ASSESSMENT CRITERIA\n\ncriteria\n";

    fn fixes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_replaces_middle_section_up_to_next_heading() {
        let out = HeadingRegexPatcher
            .patch(DOC, "COMMON MISTAKES", "new text")
            .unwrap();
        assert!(out.contains("## COMMON MISTAKES\n\nnew text\n\n## ASSESSMENT CRITERIA"));
        assert!(!out.contains("old text"));
        assert!(out.contains("### CONCEPT 1: A"));
    }

    #[test]
    fn test_replaces_last_section_to_end() {
        let out = HeadingRegexPatcher
            .patch(DOC, "## assessment criteria", "## ASSESSMENT CRITERIA\n\nbetter")
            .unwrap();
        assert!(out.ends_with("## ASSESSMENT CRITERIA\n\nbetter\n"));
        assert!(out.contains("old text"));
    }

    #[test]
    fn test_concept_subheadings_are_not_section_boundaries() {
        let out = HeadingRegexPatcher
            .patch(DOC, "CORE CONCEPTS", "rewritten")
            .unwrap();
        assert!(out.starts_with("## CORE CONCEPTS\n\nrewritten\n\n## COMMON MISTAKES"));
        assert!(!out.contains("### CONCEPT 1"));
    }

    #[test]
    fn test_missing_section_is_a_silent_no_op() {
        let outcome = apply_fixes(
            &HeadingRegexPatcher,
            DOC,
            &fixes(&[("DOMAIN ANALYSIS", "anything")]),
        );
        assert_eq!(outcome.text, DOC);
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.skipped, vec!["DOMAIN ANALYSIS".to_string()]);
    }

    #[test]
    fn test_mixed_fixes_apply_in_key_order() {
        let outcome = apply_fixes(
            &HeadingRegexPatcher,
            DOC,
            &fixes(&[("COMMON MISTAKES", "m2"), ("NOPE", "x"), ("", "y")]),
        );
        assert_eq!(outcome.applied, vec!["COMMON MISTAKES".to_string()]);
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome.text.contains("m2"));
    }
}
