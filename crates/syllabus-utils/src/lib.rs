//! Foundation crate for syllabus: shared domain types, the error taxonomy,
//! exit codes, logging setup, document markers and atomic file writes.

pub mod atomic_write;
pub mod document;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod types;
