//! Structured logging for syllabus.
//!
//! Sets up a `tracing` subscriber and provides stage-scoped helpers so every
//! stage transition logs the same fields (`subject`, `stage`, `duration_ms`).

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::types::StageId;

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise verbose mode enables debug output for
/// the syllabus crates and span-close events.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("syllabus=debug,syllabus_engine=debug,syllabus_llm=debug,info")
            } else {
                EnvFilter::try_new("syllabus=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one stage of one run.
pub fn stage_span(subject: &str, stage: StageId) -> tracing::Span {
    span!(
        Level::INFO,
        "stage",
        subject = %subject,
        stage = %stage,
        index = stage.index(),
    )
}

pub fn log_stage_start(subject: &str, stage: StageId) {
    info!(subject = %subject, stage = %stage, "Starting stage");
}

pub fn log_stage_complete(subject: &str, stage: StageId, duration_ms: u128) {
    info!(
        subject = %subject,
        stage = %stage,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

pub fn log_stage_skipped(subject: &str, stage: StageId) {
    info!(subject = %subject, stage = %stage, "Stage restored from checkpoint");
}

/// Cancellation is logged at info; it is not an error.
pub fn log_stage_error(subject: &str, stage: StageId, error: &str, duration_ms: u128) {
    error!(
        subject = %subject,
        stage = %stage,
        duration_ms = %duration_ms,
        error = %error,
        "Stage failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_logging_functions() {
        // No subscriber installed; these must not panic.
        let span = stage_span("Test Subject", StageId::Content);
        let _guard = span.enter();
        log_stage_start("Test Subject", StageId::Content);
        log_stage_complete("Test Subject", StageId::Content, 42);
        log_stage_skipped("Test Subject", StageId::Analysis);
        log_stage_error("Test Subject", StageId::Content, "boom", 7);
    }
}
