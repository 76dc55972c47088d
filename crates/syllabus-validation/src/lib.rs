//! Validation of generated curriculum content
//!
//! - [`LocalValidator`]: deterministic structural metrics, no model calls
//! - [`RemoteValidator`]: model review of framing, terminology and specificity
//! - [`SectionPatcher`] / [`apply_fixes`]: section-scoped corrections

mod fix;
mod local;
mod remote;
mod result;

pub use fix::{FixOutcome, HeadingRegexPatcher, SectionPatcher, apply_fixes};
pub use local::LocalValidator;
pub use remote::{
    RemoteAssessment, RemoteValidator, ReviewSettings, merge, parse_review, sample_document,
};
pub use result::{LocalMetrics, ValidationResult, Violations};
