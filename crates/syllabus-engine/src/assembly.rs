//! Final document assembly.

use syllabus_utils::document::{lifecycle_label, section_heading};
use syllabus_utils::types::Stage1Result;

pub const DOMAIN_ANALYSIS: &str = "DOMAIN ANALYSIS";

/// Stage-1 header, then the framework, then the (possibly fixed) content.
#[must_use]
pub fn assemble_document(
    subject: &str,
    stage1: &Stage1Result,
    framework: &str,
    content: &str,
) -> String {
    let mut doc = format!("# {subject}\n\n{}\n\n", section_heading(DOMAIN_ANALYSIS));
    doc.push_str(&format!("**Domain:** {}\n\n", stage1.domain));
    doc.push_str(&format!("**Role:** {}\n\n", stage1.role));

    doc.push_str("**Lifecycle:**\n\n");
    for (i, phase) in stage1.lifecycle.iter().enumerate() {
        doc.push_str(&format!(
            "{}. {} {}\n",
            i + 1,
            lifecycle_label(&phase.verb),
            phase.description
        ));
    }
    doc.push('\n');

    if !stage1.excluded_actions.is_empty() {
        doc.push_str("**Outside scope:**\n\n");
        for action in &stage1.excluded_actions {
            doc.push_str(&format!("- {action}\n"));
        }
        doc.push('\n');
    }
    if !stage1.source_verification.trim().is_empty() {
        doc.push_str(&format!(
            "**Source verification:** {}\n\n",
            stage1.source_verification.trim()
        ));
    }

    doc.push_str(framework.trim());
    doc.push_str("\n\n");
    doc.push_str(content.trim());
    doc.push('\n');
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabus_utils::types::Lifecycle;

    #[test]
    fn test_sections_in_fixed_order() {
        let stage1 = Stage1Result {
            domain: "Apiculture".into(),
            role: "Beekeeper".into(),
            lifecycle: Lifecycle::fallback(),
            concepts: vec!["Hive".into()],
            excluded_actions: vec!["Sell honey".into()],
            source_verification: String::new(),
        };
        let doc = assemble_document(
            "Bees",
            &stage1,
            "## DECISION FRAMEWORK\n\nfw\n",
            "## CORE CONCEPTS\n\nbody\n",
        );

        assert!(doc.starts_with("# Bees\n\n## DOMAIN ANALYSIS\n\n**Domain:** Apiculture"));
        assert!(doc.contains("1. **PREPARE:** "));
        assert!(doc.contains("- Sell honey\n"));
        assert!(!doc.contains("Source verification"));
        let fw = doc.find("## DECISION FRAMEWORK").unwrap();
        let core = doc.find("## CORE CONCEPTS").unwrap();
        assert!(fw < core);
        assert!(doc.ends_with("body\n"));
    }
}
