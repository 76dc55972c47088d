//! Removal of model meta-commentary from generated content.
//!
//! Models occasionally wrap content in apologies, announcements of what they
//! are about to write, or placeholders for text they chose not to produce.
//! Every stage-3 result passes through [`strip_boilerplate`] before it is
//! validated or stored.

use regex::Regex;
use std::sync::LazyLock;

/// Whole lines that are commentary rather than curriculum content.
static BOILERPLATE_LINES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Apologies and refusals of scope
        r"(?mi)^[ \t]*(I apologi[sz]e|I'm sorry|Sorry,|Apologies)\b.*$\n?",
        // Announcements of upcoming output
        concat!(
            r"(?mi)^[ \t]*(I'll|I will|Let me|I'm going to|Now I'll|Next, I'll) (now )?",
            r"(continue|write|create|generate|provide|produce|cover|proceed)\b.*$\n?",
        ),
        // Enthusiastic preambles
        r"(?mi)^[ \t]*(Certainly|Sure|Absolutely|Of course|Great)[!,.].*$\n?",
        // Presentational lead-ins
        r"(?mi)^[ \t]*(Here (is|are)|Below (is|are)) (the|a|an) .{0,60}:[ \t]*$\n?",
        // Offers to continue
        r"(?mi)^[ \t]*(Would you like|Let me know if|Shall I|Do you want) .*$\n?",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("boilerplate line pattern is valid"))
    .collect()
});

/// Placeholders standing in for omitted content, removed wherever they occur.
static TRUNCATION_PLACEHOLDERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        concat!(
            r"(?i)\[\s*(content|output|text|response)?\s*",
            r"(truncated|continues|continued|omitted)[^\]]*\]",
        ),
        concat!(
            r"(?i)\((remaining|additional|other) (concepts|sections|content) ",
            r"(follow|would follow|continue)[^)]*\)",
        ),
        r"(?m)^[ \t]*\[\.\.\.\][ \t]*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("placeholder pattern is valid"))
    .collect()
});

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line pattern is valid"));

/// Strip meta-commentary and placeholders, collapsing the blank lines left behind.
#[must_use]
pub fn strip_boilerplate(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in BOILERPLATE_LINES.iter().chain(TRUNCATION_PLACEHOLDERS.iter()) {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    let collapsed = EXCESS_BLANK_LINES.replace_all(&cleaned, "\n\n");
    let mut out = collapsed.trim().to_string();
    out.push('\n');
    out
}
