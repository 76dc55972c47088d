//! Prompt text for every model call the engine issues.

use syllabus_utils::document::{
    CONCEPT_DELIMITER, CORE_CONCEPTS, DECISION_FRAMEWORK, DEFINITION_MARKER, LIFECYCLE_HEADER,
    NARRATIVE_SECTIONS, concept_heading, lifecycle_label, section_heading,
};
use syllabus_utils::types::{Lifecycle, Stage1Result};

pub const ANALYST_SYSTEM: &str = "You are an expert curriculum designer who analyses \
professional domains. When asked for JSON, respond with a single JSON object.";

pub const AUTHOR_SYSTEM: &str = "You are an expert curriculum author. Write precise, \
practitioner-focused material in Markdown. Do not add commentary about your own output.";

pub fn lifecycle(subject: &str) -> String {
    format!(
        "Identify the three-phase professional lifecycle for practitioners of \"{subject}\".\n\
         Each phase is a single imperative verb plus a one-sentence description.\n\n\
         Answer with JSON only:\n\
         {{\"lifecycle\": [{{\"verb\": \"...\", \"description\": \"...\"}}, \
         {{\"verb\": \"...\", \"description\": \"...\"}}, \
         {{\"verb\": \"...\", \"description\": \"...\"}}]}}"
    )
}

pub fn analysis(subject: &str, lifecycle: &Lifecycle) -> String {
    format!(
        "Analyse the professional domain of \"{subject}\".\n\n\
         Use this lifecycle:\n{phases}\n\n\
         List between 15 and 35 core concepts a practitioner must master, ordered from \
         foundational to advanced. List actions outside the practitioner's scope as \
         excluded_actions, and note how the analysis can be verified.\n\n\
         Answer with JSON only:\n\
         {{\"domain\": \"...\", \"role\": \"...\", \"lifecycle\": [{{\"verb\": \"...\", \
         \"description\": \"...\"}}], \"concepts\": [\"...\"], \"excluded_actions\": [\"...\"], \
         \"source_verification\": \"...\"}}",
        phases = phase_list(lifecycle),
    )
}

pub fn framework(subject: &str, stage1: &Stage1Result) -> String {
    format!(
        "Write the {section} section for a \"{subject}\" curriculum.\n\n\
         Role: {role}\nDomain: {domain}\nLifecycle:\n{phases}\n\nConcepts:\n{concepts}\n\n\
         Describe dependencies between the concepts and the decisions a {role} makes at each \
         lifecycle phase. Start with the heading \"{heading}\".",
        section = DECISION_FRAMEWORK,
        heading = section_heading(DECISION_FRAMEWORK),
        role = stage1.role,
        domain = stage1.domain,
        phases = phase_list(&stage1.lifecycle),
        concepts = numbered(&stage1.concepts, 1),
    )
}

/// Prompt for concepts numbered from `first_number`.
pub fn content_batch(
    subject: &str,
    stage1: &Stage1Result,
    framework: &str,
    concepts: &[String],
    first_number: usize,
) -> String {
    let [a, b, c] = stage1.lifecycle.verbs();
    format!(
        "Continue the {section} of a \"{subject}\" curriculum for a {role}.\n\n\
         Decision framework for reference:\n{framework}\n\n\
         Write one block per concept, in this order:\n{list}\n\n\
         Every block uses exactly this layout:\n\n\
         {heading}\n\n{definition} one paragraph.\n\n{lifecycle}\n\
         {label_a} what to do.\n{label_b} what to do.\n{label_c} what to do.\n\n\
         {delimiter}\n\n\
         Do not write any other sections, introductions or closing remarks.",
        section = CORE_CONCEPTS,
        role = stage1.role,
        list = numbered(concepts, first_number),
        heading = concept_heading(first_number, "Concept Name"),
        definition = DEFINITION_MARKER,
        lifecycle = LIFECYCLE_HEADER,
        label_a = lifecycle_label(a),
        label_b = lifecycle_label(b),
        label_c = lifecycle_label(c),
        delimiter = CONCEPT_DELIMITER,
    )
}

pub fn narrative(subject: &str, stage1: &Stage1Result) -> String {
    let headings: Vec<String> = NARRATIVE_SECTIONS.iter().map(|s| section_heading(s)).collect();
    format!(
        "Write the closing sections of a \"{subject}\" curriculum for a {role}, using \
         exactly these headings in this order:\n{headings}\n\n\
         Ground every point in the domain of {domain}. Do not repeat the concept list.",
        role = stage1.role,
        domain = stage1.domain,
        headings = headings.join("\n"),
    )
}

fn phase_list(lifecycle: &Lifecycle) -> String {
    lifecycle
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}: {}", i + 1, p.verb, p.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn numbered(items: &[String], first: usize) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", first + i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage1() -> Stage1Result {
        Stage1Result {
            domain: "Beekeeping".into(),
            role: "Apiarist".into(),
            lifecycle: Lifecycle::fallback(),
            concepts: (1..=12).map(|i| format!("C{i}")).collect(),
            excluded_actions: vec![],
            source_verification: String::new(),
        }
    }

    #[test]
    fn test_content_batch_numbers_from_offset() {
        let s1 = stage1();
        let prompt = content_batch("Bees", &s1, "fw", &s1.concepts[10..], 11);
        assert!(prompt.contains("11. C11\n12. C12"));
        assert!(prompt.contains("### CONCEPT 11: Concept Name"));
        assert!(prompt.contains("**PREPARE:**"));
    }

    #[test]
    fn test_narrative_lists_fixed_sections() {
        let prompt = narrative("Bees", &stage1());
        for name in NARRATIVE_SECTIONS {
            assert!(prompt.contains(&section_heading(name)));
        }
    }
}
