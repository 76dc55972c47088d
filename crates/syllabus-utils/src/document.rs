//! Markdown markers that structure a generated curriculum document.
//!
//! Prompts ask the model for these markers, the local validator counts them
//! and section fixes address `## ` headings by name.

/// Prefix of every concept block heading, followed by `{n}: {name}`.
pub const CONCEPT_HEADING_PREFIX: &str = "### CONCEPT ";

/// Marker opening a concept's definition paragraph.
pub const DEFINITION_MARKER: &str = "**Definition:**";

/// Header introducing a concept's lifecycle breakdown.
pub const LIFECYCLE_HEADER: &str = "#### Lifecycle";

/// Line closing every concept block.
pub const CONCEPT_DELIMITER: &str = "---";

/// Section holding the stage-3 concept blocks.
pub const CORE_CONCEPTS: &str = "CORE CONCEPTS";

/// Section produced by the framework stage.
pub const DECISION_FRAMEWORK: &str = "DECISION FRAMEWORK";

/// Sections produced by the stage-3 narrative call, in order.
pub const NARRATIVE_SECTIONS: [&str; 3] = [
    "PRACTICAL APPLICATIONS",
    "COMMON MISTAKES",
    "ASSESSMENT CRITERIA",
];

/// `## NAME` heading for a top-level section.
#[must_use]
pub fn section_heading(name: &str) -> String {
    format!("## {name}")
}

/// `### CONCEPT n: name` heading, `number` is 1-based.
#[must_use]
pub fn concept_heading(number: usize, name: &str) -> String {
    format!("{CONCEPT_HEADING_PREFIX}{number}: {name}")
}

/// Bold label attached to a lifecycle phase inside a concept block.
#[must_use]
pub fn lifecycle_label(verb: &str) -> String {
    format!("**{}:**", verb.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_formatting() {
        assert_eq!(section_heading(CORE_CONCEPTS), "## CORE CONCEPTS");
        assert_eq!(concept_heading(3, "Risk"), "### CONCEPT 3: Risk");
        assert_eq!(lifecycle_label("Assess"), "**ASSESS:**");
    }
}
